//! Client for the remote crawling and scraping service (Firecrawl v2 API).

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::PageResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// An output format requested from the scraping service.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub(crate) enum ScrapeFormat {
    /// The page body rendered as markdown.
    Markdown,
    /// Structured data constrained by a JSON schema.
    Json { schema: Value },
}

/// Operations the pipeline needs from the scraping service.
///
/// Every call may fail with a transport or service error; callers decide how to
/// recover.
#[async_trait]
pub(crate) trait ScrapeService: Send + Sync {
    /// Crawls the site starting at `url`, returning up to `limit` pages with markdown bodies.
    async fn crawl(&self, url: &str, limit: usize) -> Result<Vec<PageResult>>;

    /// Enumerates the links of a site without scraping them.
    async fn map(&self, url: &str) -> Result<Vec<String>>;

    /// Scrapes a single page.
    async fn scrape(&self, url: &str, formats: &[ScrapeFormat]) -> Result<PageResult>;

    /// Scrapes many pages in one job, polling every `poll_interval` until it completes.
    /// Pages come back in the order the service returns them.
    async fn batch_scrape(
        &self,
        urls: &[String],
        formats: &[ScrapeFormat],
        poll_interval: Duration,
    ) -> Result<Vec<PageResult>>;
}

/// HTTP implementation of [`ScrapeService`] for the Firecrawl v2 API.
#[derive(Debug, Clone)]
pub(crate) struct FirecrawlClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    job_timeout: Duration,
    poll_interval: Duration,
}

impl FirecrawlClient {
    /// Creates a new client from the run configuration.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AppError::Generic(anyhow::anyhow!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            base_url: config.firecrawl_api_url.trim_end_matches('/').to_string(),
            api_key: config.firecrawl_api_key.clone(),
            job_timeout: config.job_timeout,
            poll_interval: config.poll_interval,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Checks the HTTP status and the `success` flag of a response body.
    async fn read_response(endpoint: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Service {
                endpoint: endpoint.to_string(),
                message: format!("HTTP {}: {}", status, body.trim()),
            });
        }

        let body: Value = response.json().await?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("service reported failure")
                .to_string();
            return Err(AppError::Service {
                endpoint: endpoint.to_string(),
                message,
            });
        }
        Ok(body)
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value> {
        tracing::debug!("POST {}", path);
        let response = self
            .http_client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;
        Self::read_response(path, response).await
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::read_response(url, response).await
    }

    /// Starts an async job and waits for its documents.
    async fn run_job(
        &self,
        path: &str,
        payload: &Value,
        poll_interval: Duration,
    ) -> Result<Vec<Value>> {
        let started = self.post_json(path, payload).await?;
        let id = started
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Service {
                endpoint: path.to_string(),
                message: "response did not contain a job id".to_string(),
            })?
            .to_string();
        let status_url = self.endpoint(&format!("{}/{}", path, id));

        tracing::debug!("Started job {} via {}", id, path);
        let start_time = Instant::now();

        let mut page = loop {
            let body = self.get_json(&status_url).await?;
            match body.get("status").and_then(Value::as_str) {
                Some("completed") => break body,
                Some(status @ ("failed" | "cancelled")) => {
                    return Err(AppError::Service {
                        endpoint: path.to_string(),
                        message: format!("job {} {}", id, status),
                    });
                }
                status => {
                    let done = body.get("completed").and_then(|v| v.as_u64()).unwrap_or(0);
                    let total = body.get("total").and_then(|v| v.as_u64()).unwrap_or(0);
                    tracing::debug!("Job {} status {:?} ({}/{} done)", id, status, done, total);
                }
            }
            if start_time.elapsed() >= self.job_timeout {
                return Err(AppError::JobTimeout(id));
            }
            sleep(poll_interval).await;
        };

        let mut documents = Vec::new();
        loop {
            if let Some(Value::Array(data)) = page.get_mut("data") {
                documents.append(data);
            }
            match page.get("next").and_then(Value::as_str) {
                Some(next) if !next.is_empty() => {
                    let next = next.to_string();
                    page = self.get_json(&next).await?;
                }
                _ => break,
            }
        }

        tracing::debug!(
            "Job {} completed with {} documents in {:.2?}",
            id,
            documents.len(),
            start_time.elapsed()
        );
        Ok(documents)
    }
}

/// Resolves raw documents into page results, skipping unrecognized records.
fn resolve_pages(documents: Vec<Value>) -> Vec<PageResult> {
    documents
        .into_iter()
        .filter_map(|doc| {
            let page = PageResult::from_wire(doc);
            if page.is_none() {
                tracing::debug!("Skipping unrecognized page record");
            }
            page
        })
        .collect()
}

#[async_trait]
impl ScrapeService for FirecrawlClient {
    async fn crawl(&self, url: &str, limit: usize) -> Result<Vec<PageResult>> {
        let payload = json!({
            "url": url,
            "limit": limit,
            "scrapeOptions": { "formats": [ScrapeFormat::Markdown] },
        });
        let documents = self.run_job("/v2/crawl", &payload, self.poll_interval).await?;
        Ok(resolve_pages(documents))
    }

    async fn map(&self, url: &str) -> Result<Vec<String>> {
        let body = self.post_json("/v2/map", &json!({ "url": url })).await?;
        let links = body
            .get("links")
            .and_then(Value::as_array)
            .map(|links| {
                links
                    .iter()
                    .filter_map(|link| match link {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(obj) => {
                            obj.get("url").and_then(Value::as_str).map(str::to_string)
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(links)
    }

    async fn scrape(&self, url: &str, formats: &[ScrapeFormat]) -> Result<PageResult> {
        let body = self
            .post_json("/v2/scrape", &json!({ "url": url, "formats": formats }))
            .await?;
        let data = body.get("data").cloned().unwrap_or(Value::Null);
        let mut page = PageResult::from_wire(data).ok_or_else(|| AppError::Service {
            endpoint: "/v2/scrape".to_string(),
            message: format!("no page document returned for {}", url),
        })?;
        if page.url.is_none() {
            page.url = Some(url.to_string());
        }
        Ok(page)
    }

    async fn batch_scrape(
        &self,
        urls: &[String],
        formats: &[ScrapeFormat],
        poll_interval: Duration,
    ) -> Result<Vec<PageResult>> {
        let payload = json!({ "urls": urls, "formats": formats });
        let documents = self
            .run_job("/v2/batch/scrape", &payload, poll_interval)
            .await?;
        Ok(resolve_pages(documents))
    }
}
