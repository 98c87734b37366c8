//! In-memory scraping service used by unit tests.

use crate::error::{AppError, Result};
use crate::firecrawl::{ScrapeFormat, ScrapeService};
use crate::models::PageResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

fn service_error(endpoint: &str, message: &str) -> AppError {
    AppError::Service {
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    }
}

/// Serves canned pages and records every call it receives.
#[derive(Default)]
pub(crate) struct StubScrapeService {
    pub crawl_pages: Option<Vec<PageResult>>,
    pub map_links: Option<Vec<String>>,
    pub pages: HashMap<String, PageResult>,
    pub fail_batches: bool,
    /// 1-based positions of batch calls that fail.
    pub failing_batch_calls: HashSet<usize>,
    pub failing_urls: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl StubScrapeService {
    pub(crate) fn with_pages(pages: Vec<PageResult>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .filter_map(|p| p.url.clone().map(|u| (u, p)))
                .collect(),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ScrapeService for StubScrapeService {
    async fn crawl(&self, url: &str, limit: usize) -> Result<Vec<PageResult>> {
        self.record(format!("crawl {} {}", url, limit));
        self.crawl_pages
            .clone()
            .ok_or_else(|| service_error("/v2/crawl", "crawl unavailable"))
    }

    async fn map(&self, url: &str) -> Result<Vec<String>> {
        self.record(format!("map {}", url));
        self.map_links
            .clone()
            .ok_or_else(|| service_error("/v2/map", "map unavailable"))
    }

    async fn scrape(&self, url: &str, _formats: &[ScrapeFormat]) -> Result<PageResult> {
        self.record(format!("scrape {}", url));
        if self.failing_urls.contains(url) {
            return Err(service_error("/v2/scrape", "page failed"));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| service_error("/v2/scrape", "unknown page"))
    }

    async fn batch_scrape(
        &self,
        urls: &[String],
        _formats: &[ScrapeFormat],
        _poll_interval: Duration,
    ) -> Result<Vec<PageResult>> {
        self.record(format!("batch {}", urls.len()));
        let call_number = self
            .calls()
            .iter()
            .filter(|c| c.starts_with("batch "))
            .count();
        if self.fail_batches || self.failing_batch_calls.contains(&call_number) {
            return Err(service_error("/v2/batch/scrape", "batch failed"));
        }
        Ok(urls
            .iter()
            .filter(|u| !self.failing_urls.contains(*u))
            .filter_map(|u| self.pages.get(u).cloned())
            .collect())
    }
}
