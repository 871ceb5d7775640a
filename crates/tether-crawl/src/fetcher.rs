//! HTTP content fetcher with transient/permanent failure classification.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use tether_core::defaults::CRAWL_USER_AGENT;
use tether_core::{ContentFetcher, Error, FetchError, FetchedPage, Result};

/// reqwest-backed [`ContentFetcher`].
///
/// Classification drives the scheduler's retry policy: timeouts,
/// connection errors, 429, and 5xx are transient; every other 4xx is
/// permanent.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(CRAWL_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<FetchedPage, FetchError> {
        let start = Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::transient(None, format!("body read failed: {}", e)))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(
            subsystem = "crawl",
            component = "fetcher",
            op = "fetch",
            url = %url,
            http_status = status.as_u16(),
            duration_ms = elapsed_ms,
            "Fetched page"
        );

        Ok(FetchedPage {
            html,
            http_status: status.as_u16(),
            elapsed_ms,
        })
    }
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::transient(None, format!("timeout: {}", e))
    } else if e.is_connect() {
        FetchError::transient(None, format!("connection failed: {}", e))
    } else if let Some(status) = e.status() {
        classify_status(status)
    } else {
        FetchError::transient(None, e.to_string())
    }
}

fn classify_status(status: StatusCode) -> FetchError {
    let code = status.as_u16();
    if code == 429 || status.is_server_error() {
        FetchError::transient(Some(code), format!("HTTP {}", code))
    } else {
        FetchError::permanent(Some(code), format!("HTTP {}", code))
    }
}
