//! Error taxonomy for the scraping pipeline.
//!
//! Field-level problems are `ParseError`s and never abort a page. Page-level
//! problems are `ScrapeError`s and push the orchestrator onto its fallback
//! tier. A site that fails both tiers is reported as an `AggregateSiteError`
//! next to the listings of the healthy sites.

use serde::Serialize;
use thiserror::Error;

/// Errors raised while fetching or extracting a single page
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Host not recognized; rejected before any fetch
    #[error("unsupported site: {target}")]
    UnsupportedSite { target: String },

    /// The rendered page did not load within its timeout
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// The expected card container never appeared
    #[error("timed out after {seconds}s waiting for '{selector}'")]
    Timeout { selector: String, seconds: u64 },

    /// Browser could not be launched or driven
    #[error("browser error: {0}")]
    Browser(String),

    /// Direct HTTP fetch failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Direct HTTP fetch returned a non-success status
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Adapter configuration could not be applied to the page
    #[error("adapter error: {0}")]
    Adapter(String),

    /// The caller cancelled the run
    #[error("operation cancelled")]
    Cancelled,
}

impl ScrapeError {
    /// Whether the failure should move the orchestrator to its next tier
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ScrapeError::UnsupportedSite { .. } | ScrapeError::Cancelled
        )
    }
}

/// A card was found but one of its required fields was structurally absent
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("card {card}: missing {field}")]
pub struct ParseError {
    pub card: usize,
    pub field: &'static str,
}

/// One site's entire extraction failed after both tiers
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[error("{site}: {message}")]
pub struct AggregateSiteError {
    pub site: String,
    pub message: String,
}

/// Errors that abort a whole aggregation run
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("aggregation cancelled")]
    Cancelled,
}
