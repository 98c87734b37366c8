//! Defines the custom error types for the lead-harvester application.

use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for the lead extraction process.
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// The scraping service answered, but reported a failure.
    #[error("Scraping Service Error ({endpoint}): {message}")]
    Service {
        /// The endpoint that was called, e.g. `/v2/batch/scrape`.
        endpoint: String,
        /// The message returned by the service, or the HTTP status.
        message: String,
    },

    /// A remote crawl or batch job did not finish in time.
    #[error("Job {0} did not complete before the configured timeout")]
    JobTimeout(String),

    /// Error during DNS resolution.
    #[error("DNS Resolution Error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    /// Specific DNS error indicating the domain does not exist.
    #[error("Domain Not Found (NXDOMAIN): {0}")]
    NxDomain(String),

    /// Specific DNS error indicating no relevant records were found.
    #[error("No DNS Records Found (MX/A): {0}")]
    NoDnsRecords(String),

    /// DNS operation timed out.
    #[error("DNS Timeout for domain: {0}")]
    DnsTimeout(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),
}

pub(crate) type Result<T> = std::result::Result<T, AppError>;
