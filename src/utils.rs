use crate::error::{GrabberError, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = "ComicGrabber/0.1 (chapter acquisition pipeline)";

/// Shared HTTP client. Every request waits on the rate limiter first, since the
/// external sources we talk to throttle aggressively.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpClient {
    pub fn new(user_agent: Option<&str>, rate_limit_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .build()?;

        let limiter = Quota::with_period(Duration::from_millis(rate_limit_ms))
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Ok(Self { client, limiter })
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    pub async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Response> {
        self.throttle().await;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .headers(header_map(headers)?)
            .send()
            .await?;

        Ok(response.error_for_status()?)
    }

    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        Ok(self.get(url, headers).await?.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, headers: &[(&str, &str)]) -> Result<T> {
        let body = self.get_text(url, headers).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn header_map(headers: &[(&str, &str)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| GrabberError::validation(format!("invalid header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| GrabberError::validation(format!("invalid header value for {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}
