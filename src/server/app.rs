//! Router and shared state.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::aggregate::Aggregator;
use crate::scrapers::types::FilterCriteria;
use crate::server::routes::{aggregate_handler, health_handler, scrape_handler};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    /// Used when a request does not carry its own criteria
    pub default_criteria: FilterCriteria,
    /// Cancelled on shutdown; every request runs under a child token
    pub shutdown: CancellationToken,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/scrape", get(scrape_handler))
        .route("/aggregate", post(aggregate_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
