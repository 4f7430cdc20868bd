use crate::error::ScrapeError;
use crate::scrapers::types::Strategy;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Common trait for page fetch strategies
/// The fallback orchestrator holds one of each and never looks past this trait
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page markup for `url`. `wait_selector` is the site's card
    /// container, for strategies that can wait on the live DOM.
    async fn fetch_page(
        &self,
        url: &str,
        wait_selector: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError>;

    /// Which strategy this fetcher implements
    fn strategy(&self) -> Strategy;
}
