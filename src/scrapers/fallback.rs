//! Two-tier extraction: render first, fall back to a direct fetch.
//!
//! Rendering handles script-driven sites but is slow and fails in more ways;
//! the direct fetch is a cheap safety net. Only when both tiers fail does the
//! caller get an error, so "site unreachable" stays distinguishable from "no
//! matching listings".

use super::adapter::SiteAdapter;
use super::engine::extract_page;
use super::traits::PageFetcher;
use super::types::{PageExtraction, Strategy};
use crate::error::ScrapeError;
use crate::models::{RawListing, Source};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A site's listings, tagged with the strategy that produced them
#[derive(Debug, Clone)]
pub struct SiteExtraction {
    pub site: &'static str,
    pub source: Source,
    pub strategy: Strategy,
    pub listings: Vec<RawListing>,
    pub trace: Vec<String>,
}

/// Terminal failure for one site, with whatever trace was gathered
#[derive(Debug, Error)]
#[error("{error}")]
pub struct SiteFailure {
    pub error: ScrapeError,
    pub trace: Vec<String>,
}

enum Tier {
    Primary,
    Fallback,
}

pub struct FallbackOrchestrator {
    primary: Arc<dyn PageFetcher>,
    fallback: Arc<dyn PageFetcher>,
}

impl FallbackOrchestrator {
    pub fn new(primary: Arc<dyn PageFetcher>, fallback: Arc<dyn PageFetcher>) -> Self {
        Self { primary, fallback }
    }

    /// Extract every listing card from one search URL
    pub async fn run(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<SiteExtraction, SiteFailure> {
        let adapter = SiteAdapter::for_url(target).map_err(|error| SiteFailure {
            error,
            trace: Vec::new(),
        })?;

        let mut trace = Vec::new();
        let mut tier = Tier::Primary;

        loop {
            let fetcher = match tier {
                Tier::Primary => &self.primary,
                Tier::Fallback => &self.fallback,
            };
            let strategy = fetcher.strategy();
            trace.push(format!("{}: trying {} strategy", adapter.name(), strategy.as_str()));

            match attempt(fetcher.as_ref(), &adapter, target, cancel).await {
                Ok(extraction) => {
                    info!(
                        site = adapter.name(),
                        strategy = strategy.as_str(),
                        "Extracted {} listings",
                        extraction.listings.len()
                    );
                    trace.extend(extraction.trace);
                    return Ok(SiteExtraction {
                        site: adapter.name(),
                        source: adapter.source(),
                        strategy,
                        listings: extraction.listings,
                        trace,
                    });
                }
                Err(error) => {
                    trace.push(format!("{}: {} strategy failed: {}", adapter.name(), strategy.as_str(), error));
                    match tier {
                        Tier::Primary if error.is_recoverable() => {
                            warn!(
                                site = adapter.name(),
                                error = %error,
                                "Rendered extraction failed, falling back to direct fetch"
                            );
                            tier = Tier::Fallback;
                        }
                        _ => return Err(SiteFailure { error, trace }),
                    }
                }
            }
        }
    }
}

async fn attempt(
    fetcher: &dyn PageFetcher,
    adapter: &SiteAdapter,
    target: &str,
    cancel: &CancellationToken,
) -> Result<PageExtraction, ScrapeError> {
    let page = fetcher.fetch_page(target, adapter.wait_selector(), cancel).await?;
    Ok(extract_page(adapter, &page))
}
