//! Utility functions for handling the target site URL.

use crate::error::{AppError, Result};
use url::Url;

/// Parses the target site into a URL, adding an `https://` scheme when missing.
///
/// # Arguments
/// * `website_url_str` - The domain or URL given on the command line.
///
/// # Returns
/// * `Ok(Url)` with a host.
/// * `Err(AppError)` if the input is empty, unparsable, or has no host.
pub(crate) fn normalize_url(website_url_str: &str) -> Result<Url> {
    let trimmed = website_url_str.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config("Target domain is empty".to_string()));
    }

    let url_str_with_scheme =
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            format!("https://{}", trimmed)
        } else {
            trimmed.to_string()
        };

    let url = Url::parse(&url_str_with_scheme).map_err(|e| {
        tracing::error!(
            "Failed to parse URL '{}' (original: {}): {}",
            url_str_with_scheme,
            website_url_str,
            e
        );
        AppError::UrlParse(e)
    })?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(AppError::Config(format!(
            "Could not extract host from URL: {}",
            url_str_with_scheme
        )));
    }

    Ok(url)
}
