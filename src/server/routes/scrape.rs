use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::CanonicalListing;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct ScrapeQuery {
    target: Option<String>,
    #[serde(default)]
    debug: bool,
}

#[derive(Serialize)]
pub struct ScrapeSuccess {
    success: bool,
    count: usize,
    properties: Vec<CanonicalListing>,
    fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct ScrapeFailure {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_details: Option<String>,
}

fn failure(
    status: StatusCode,
    error: &'static str,
    message: String,
    debug: Option<Vec<String>>,
    error_details: Option<String>,
) -> Response {
    let body = ScrapeFailure {
        success: false,
        error,
        message,
        debug,
        error_details,
    };
    (status, Json(body)).into_response()
}

/// Scrape one search URL and return its normalized listings, unfiltered
pub async fn scrape_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ScrapeQuery>,
) -> Response {
    let Some(target) = query.target.filter(|t| !t.trim().is_empty()) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "missing_target",
            "Missing ?target=<search url>".to_string(),
            None,
            None,
        );
    };

    info!("Scrape requested for {}", target);

    let cancel = state.shutdown.child_token();
    // Aborts outstanding fetches if the client goes away mid-request
    let _guard = cancel.clone().drop_guard();

    match state.aggregator.scrape(&target, &cancel).await {
        Ok(outcome) => {
            let fallback = outcome.used_fallback();
            let body = ScrapeSuccess {
                success: true,
                count: outcome.listings.len(),
                properties: outcome.listings,
                fallback,
                debug: query.debug.then_some(outcome.trace),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(site_failure) => {
            let debug = query.debug.then(|| site_failure.trace.clone());
            match &site_failure.error {
                ScrapeError::UnsupportedSite { .. } => failure(
                    StatusCode::BAD_REQUEST,
                    "unsupported_site",
                    site_failure.error.to_string(),
                    debug,
                    None,
                ),
                error => {
                    warn!("Scrape of {} failed: {}", target, error);
                    failure(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "extraction_failed",
                        format!("Could not extract listings from {}", target),
                        debug,
                        Some(error.to_string()),
                    )
                }
            }
        }
    }
}
