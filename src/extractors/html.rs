use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::{dedup_in_order, is_page_image};
use crate::config::DiscoveryConfig;
use crate::error::{GrabberError, Result};
use crate::traits::PageExtractor;
use crate::utils::HttpClient;

/// Lazy-loading attributes are checked before `src`.
const IMAGE_ATTRIBUTES: [&str; 4] = ["data-src", "data-lazy-src", "data-cfsrc", "src"];

/// Scrapes page images straight out of the chapter's HTML.
pub struct HtmlPageExtractor {
    http_client: HttpClient,
    selector: Selector,
}

impl HtmlPageExtractor {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config.user_agent.as_deref(), config.rate_limit_ms)?,
            selector: combined_selector(&config.image_selectors)?,
        })
    }

    /// Image URLs in document order, made absolute against `base_url`.
    pub fn parse_images(&self, html: &str, base_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let base = Url::parse(base_url).ok();

        let urls = document
            .select(&self.selector)
            .filter_map(|element| {
                IMAGE_ATTRIBUTES
                    .iter()
                    .filter_map(|attr| element.value().attr(attr))
                    .map(str::trim)
                    .find(|v| !v.is_empty() && !v.starts_with("data:"))
            })
            .filter_map(|src| match &base {
                Some(base) => base.join(src).ok().map(String::from),
                None => Some(src.to_string()),
            })
            .filter(|url| is_page_image(url))
            .collect();

        dedup_in_order(urls)
    }
}

/// One selector matching any of the configured ones, so matches come back in
/// document order instead of grouped by selector.
fn combined_selector(selectors: &[String]) -> Result<Selector> {
    if selectors.is_empty() {
        return Err(GrabberError::validation("no image selectors configured"));
    }
    let joined = selectors.join(", ");
    Selector::parse(&joined).map_err(|e| GrabberError::validation(format!("invalid image selector {joined:?}: {e}")))
}

#[async_trait::async_trait]
impl PageExtractor for HtmlPageExtractor {
    async fn extract_pages(&self, chapter_url: &str) -> Result<Vec<String>> {
        info!("[DISCOVERY/HTML] Getting chapter images from: {}", chapter_url);

        let html = self.http_client.get_text(chapter_url, &[]).await?;
        debug!("[DISCOVERY/HTML] HTML length: {}", html.len());

        let pages = self.parse_images(&html, chapter_url);
        if pages.is_empty() {
            return Err(GrabberError::scraping("No images found in chapter"));
        }

        info!("[DISCOVERY/HTML] Found {} pages", pages.len());
        Ok(pages)
    }
}
