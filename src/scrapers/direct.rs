use crate::config::DirectConfig;
use crate::error::ScrapeError;
use crate::scrapers::traits::PageFetcher;
use crate::scrapers::types::Strategy;
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Page fetcher that issues a plain HTTP GET and runs no scripts
pub struct DirectFetcher {
    client: Client,
}

impl DirectFetcher {
    pub fn new(settings: &DirectConfig) -> Result<Self, ScrapeError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<String, ScrapeError> {
        debug!("Fetching URL: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", url, response.status());
            return Err(ScrapeError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await?;
        debug!("Downloaded {} bytes of HTML", html.len());
        Ok(html)
    }
}

#[async_trait]
impl PageFetcher for DirectFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        _wait_selector: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
            result = self.get(url) => result,
        }
    }

    fn strategy(&self) -> Strategy {
        Strategy::Direct
    }
}
