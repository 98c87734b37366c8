//! Page extraction engine: batched structured scraping with per-URL fallback.

use crate::config::Config;
use crate::firecrawl::{ScrapeFormat, ScrapeService};
use crate::models::RawContact;
use crate::normalizer::normalize_page;
use crate::progress::progress_bar;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// JSON schema for the structured extraction request.
pub(crate) fn contact_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "contacts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string", "description": "Full name of person"},
                        "title": {"type": "string", "description": "Job title or role"},
                        "email": {"type": "string", "description": "Email address"},
                        "linkedin": {"type": "string", "description": "LinkedIn profile URL"},
                        "phone": {"type": "string", "description": "Phone number"},
                        "company": {"type": "string", "description": "Company name"}
                    }
                }
            }
        }
    })
}

/// Markdown plus schema-constrained JSON, used for every extraction request.
pub(crate) fn extraction_formats() -> Vec<ScrapeFormat> {
    vec![
        ScrapeFormat::Markdown,
        ScrapeFormat::Json {
            schema: contact_schema(),
        },
    ]
}

/// Tunables for the extraction engine.
#[derive(Debug, Clone)]
pub(crate) struct ExtractionSettings {
    pub batch_size: usize,
    pub use_batch: bool,
    pub batch_delay: Duration,
    pub single_delay: Duration,
    pub poll_interval: Duration,
}

impl ExtractionSettings {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            use_batch: config.use_batch,
            batch_delay: config.batch_delay,
            single_delay: config.single_delay,
            poll_interval: config.poll_interval,
        }
    }
}

/// A page that could not be scraped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PageFailure {
    pub url: String,
    pub reason: String,
}

/// Everything the engine produced for one call to [`ExtractionEngine::extract`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ExtractionReport {
    /// Raw contacts in page processing order.
    pub contacts: Vec<RawContact>,
    /// Pages successfully returned by the service.
    pub pages_scraped: usize,
    /// Batches that failed and were retried URL by URL.
    pub batches_fallen_back: usize,
    pub failures: Vec<PageFailure>,
}

pub(crate) struct ExtractionEngine {
    service: Arc<dyn ScrapeService>,
    settings: ExtractionSettings,
    formats: Vec<ScrapeFormat>,
}

impl ExtractionEngine {
    pub(crate) fn new(service: Arc<dyn ScrapeService>, settings: ExtractionSettings) -> Self {
        Self {
            service,
            settings,
            formats: extraction_formats(),
        }
    }

    /// Extracts raw contacts from `urls`.
    ///
    /// With batching enabled and more than one URL, the URLs are sent in chunks
    /// of `batch_size`. A chunk whose batch request fails is scraped URL by URL.
    /// A single URL, or batching disabled, goes straight to individual scrapes.
    /// Failures never abort the run; they are listed in the report.
    pub(crate) async fn extract(&self, urls: &[String]) -> ExtractionReport {
        tracing::info!(target: "extract_task", "Extracting data from {} pages...", urls.len());
        let mut report = ExtractionReport::default();

        if self.settings.use_batch && urls.len() > 1 {
            let chunks: Vec<&[String]> = urls.chunks(self.settings.batch_size).collect();
            let bar = progress_bar(chunks.len(), "Batch scraping");

            for (index, chunk) in chunks.into_iter().enumerate() {
                self.extract_batch(index, chunk, &mut report).await;
                bar.inc(1);
            }
            bar.finish_and_clear();
        } else {
            let bar = progress_bar(urls.len(), "Scraping");
            for url in urls {
                self.extract_single(url, &mut report).await;
                bar.inc(1);
            }
            bar.finish_and_clear();
        }

        tracing::info!(target: "extract_task",
            "Extraction finished: {} pages scraped, {} failed, {} raw contacts",
            report.pages_scraped,
            report.failures.len(),
            report.contacts.len()
        );
        report
    }

    async fn extract_batch(&self, index: usize, chunk: &[String], report: &mut ExtractionReport) {
        let result = self
            .service
            .batch_scrape(chunk, &self.formats, self.settings.poll_interval)
            .await;

        match result {
            Ok(pages) => {
                tracing::debug!(target: "extract_task",
                    "Batch {} returned {} of {} pages", index + 1, pages.len(), chunk.len()
                );
                for page in &pages {
                    report.contacts.extend(normalize_page(page));
                }
                report.pages_scraped += pages.len();
                sleep(self.settings.batch_delay).await;
            }
            Err(e) => {
                tracing::warn!(target: "extract_task",
                    "Batch {} failed: {}. Scraping its {} URLs individually.",
                    index + 1, e, chunk.len()
                );
                report.batches_fallen_back += 1;
                for url in chunk {
                    self.extract_single(url, report).await;
                }
            }
        }
    }

    async fn extract_single(&self, url: &str, report: &mut ExtractionReport) {
        match self.service.scrape(url, &self.formats).await {
            Ok(page) => {
                report.contacts.extend(normalize_page(&page));
                report.pages_scraped += 1;
                sleep(self.settings.single_delay).await;
            }
            Err(e) => {
                tracing::warn!(target: "extract_task", "Failed {}: {}", url, e);
                report.failures.push(PageFailure {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}
