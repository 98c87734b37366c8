//! Flattens a scraped page into raw contact records.

use crate::email::extract_emails_from_text;
use crate::models::{PageResult, RawContact};

/// Converts one page result into zero or more raw contacts.
///
/// Structured contacts come first, in the order of the `contacts` array. The
/// markdown body is then always scanned for email addresses, and every distinct
/// match adds an email-only record, even when the structured path already
/// produced the same address.
///
/// # Arguments
/// * `page` - The resolved page result.
///
/// # Returns
/// * `Vec<RawContact>` carrying the page URL (empty when unknown).
pub(crate) fn normalize_page(page: &PageResult) -> Vec<RawContact> {
    let url = page.url.as_deref().unwrap_or("");
    let mut contacts = Vec::new();

    if let Some(items) = &page.contacts {
        contacts.extend(
            items
                .iter()
                .filter_map(|item| item.as_object())
                .map(|item| RawContact::from_structured(url, item)),
        );
    }
    let structured = contacts.len();

    if let Some(markdown) = page.markdown.as_deref().filter(|m| !m.is_empty()) {
        contacts.extend(
            extract_emails_from_text(markdown)
                .iter()
                .map(|email| RawContact::email_only(url, email)),
        );
    }

    tracing::debug!(target: "extract_task",
        "Page {}: {} structured contacts, {} from markdown scan",
        url,
        structured,
        contacts.len() - structured
    );
    contacts
}
