use regex::Regex;
use serde::Deserialize;
use tracing::info;
use url::Url;

use super::{dedup_in_order, is_page_image};
use crate::config::DiscoveryConfig;
use crate::error::{GrabberError, Result};
use crate::traits::PageExtractor;
use crate::utils::HttpClient;

/// Delegates fetching to a third-party web scraping service and picks the page
/// images out of the content it returns (markdown or HTML).
pub struct RemotePageExtractor {
    http_client: HttpClient,
    endpoint: String,
    api_key: Option<String>,
    markdown_image: Regex,
    html_image: Regex,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    content: String,
}

impl RemotePageExtractor {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| GrabberError::validation("discovery.endpoint is required for the remote extractor"))?;

        Ok(Self {
            http_client: HttpClient::new(config.user_agent.as_deref(), config.rate_limit_ms)?,
            endpoint,
            api_key: config.api_key.clone(),
            markdown_image: Regex::new(r"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+[^)]*)?\)")
                .map_err(|e| GrabberError::validation(e.to_string()))?,
            html_image: Regex::new(r#"<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#)
                .map_err(|e| GrabberError::validation(e.to_string()))?,
        })
    }

    /// Image URLs in the order they appear in `content`.
    pub fn parse_content(&self, content: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = self
            .markdown_image
            .captures_iter(content)
            .chain(self.html_image.captures_iter(content))
            .filter_map(|caps| caps.get(1))
            .map(|m| (m.start(), m.as_str().trim().to_string()))
            .collect();
        found.sort_by_key(|(position, _)| *position);

        let urls = found
            .into_iter()
            .map(|(_, url)| url)
            .filter(|url| is_page_image(url))
            .collect();
        dedup_in_order(urls)
    }
}

#[async_trait::async_trait]
impl PageExtractor for RemotePageExtractor {
    async fn extract_pages(&self, chapter_url: &str) -> Result<Vec<String>> {
        info!("[DISCOVERY/REMOTE] Scraping {} via {}", chapter_url, self.endpoint);

        let mut url = Url::parse(&self.endpoint)?;
        url.query_pairs_mut().append_pair("url", chapter_url);

        let headers: Vec<(&str, &str)> = self
            .api_key
            .as_deref()
            .map(|key| vec![("x-api-key", key)])
            .unwrap_or_default();
        let response: ScrapeResponse = self.http_client.get_json(url.as_str(), &headers).await?;

        let pages = self.parse_content(&response.content);
        if pages.is_empty() {
            return Err(GrabberError::scraping("Scrape service returned no page images"));
        }

        info!("[DISCOVERY/REMOTE] Found {} pages", pages.len());
        Ok(pages)
    }
}
