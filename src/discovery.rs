//! Discovers the URLs of a target site: crawl first, map as the single fallback.

use crate::firecrawl::ScrapeService;

/// Where the discovered URLs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscoverySource {
    Crawl,
    Map,
    /// Both the crawl and the map request failed.
    Unavailable,
}

/// Discovered URLs, in the order the service returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Discovery {
    pub urls: Vec<String>,
    pub source: DiscoverySource,
}

/// Discovers reachable URLs of `domain`.
///
/// A crawl limited to `page_limit` pages is attempted first. If it fails, one
/// map request is made; if that fails too, the result is empty.
///
/// # Arguments
/// * `service` - The scraping service.
/// * `domain` - The site root, including scheme.
/// * `page_limit` - Maximum number of pages the crawl may visit.
pub(crate) async fn discover(
    service: &dyn ScrapeService,
    domain: &str,
    page_limit: usize,
) -> Discovery {
    tracing::info!(target: "discovery_task", "Crawling {} (limit {} pages)...", domain, page_limit);

    match service.crawl(domain, page_limit).await {
        Ok(pages) => {
            let total = pages.len();
            let urls: Vec<String> = pages.into_iter().filter_map(|page| page.url).collect();
            if urls.len() < total {
                tracing::debug!(target: "discovery_task",
                    "Skipped {} crawl records without a URL", total - urls.len()
                );
            }
            tracing::info!(target: "discovery_task", "Found {} pages", urls.len());
            Discovery {
                urls,
                source: DiscoverySource::Crawl,
            }
        }
        Err(e) => {
            tracing::warn!(target: "discovery_task", "Crawl failed: {}. Falling back to map.", e);
            map_site(service, domain).await
        }
    }
}

async fn map_site(service: &dyn ScrapeService, domain: &str) -> Discovery {
    tracing::info!(target: "discovery_task", "Mapping {}...", domain);
    match service.map(domain).await {
        Ok(urls) => {
            tracing::info!(target: "discovery_task", "Mapped {} URLs", urls.len());
            Discovery {
                urls,
                source: DiscoverySource::Map,
            }
        }
        Err(e) => {
            tracing::error!(target: "discovery_task", "Map failed: {}", e);
            Discovery {
                urls: Vec::new(),
                source: DiscoverySource::Unavailable,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageResult;
    use crate::testing::StubScrapeService;

    fn page(url: Option<&str>) -> PageResult {
        PageResult {
            url: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_crawl_urls_skip_records_without_url() {
        let service = StubScrapeService {
            crawl_pages: Some(vec![page(Some("http://x.com/")), page(None), page(Some("http://x.com/team"))]),
            ..Default::default()
        };
        let discovery = discover(&service, "http://x.com", 100).await;
        assert_eq!(discovery.source, DiscoverySource::Crawl);
        assert_eq!(discovery.urls, vec!["http://x.com/", "http://x.com/team"]);
        assert_eq!(service.calls(), vec!["crawl http://x.com 100"]);
    }

    #[tokio::test]
    async fn test_crawl_failure_falls_back_to_map() {
        let service = StubScrapeService {
            map_links: Some(vec!["http://x.com/".to_string()]),
            ..Default::default()
        };
        let discovery = discover(&service, "http://x.com", 100).await;
        assert_eq!(discovery.source, DiscoverySource::Map);
        assert_eq!(discovery.urls, vec!["http://x.com/"]);
        assert_eq!(service.calls(), vec!["crawl http://x.com 100", "map http://x.com"]);
    }

    #[tokio::test]
    async fn test_both_failures_yield_empty() {
        let service = StubScrapeService::default();
        let discovery = discover(&service, "http://x.com", 10).await;
        assert_eq!(discovery.source, DiscoverySource::Unavailable);
        assert!(discovery.urls.is_empty());
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_crawl_does_not_trigger_map() {
        let service = StubScrapeService {
            crawl_pages: Some(Vec::new()),
            map_links: Some(vec!["http://x.com/".to_string()]),
            ..Default::default()
        };
        let discovery = discover(&service, "http://x.com", 10).await;
        assert!(discovery.urls.is_empty());
        assert_eq!(service.calls(), vec!["crawl http://x.com 10"]);
    }
}
