use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::aggregate::AggregateRequest;
use crate::error::AggregateError;
use crate::scrapers::types::FilterCriteria;
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct AggregateBody {
    #[serde(default)]
    targets: Vec<String>,
    criteria: Option<FilterCriteria>,
}

/// Aggregate several sites; per-site failures come back in `errors`
pub async fn aggregate_handler(
    Extension(state): Extension<AppState>,
    Json(body): Json<AggregateBody>,
) -> Response {
    if body.targets.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "missing_targets",
                "message": "Request body needs at least one entry in `targets`",
            })),
        )
            .into_response();
    }

    let request = AggregateRequest {
        targets: body.targets,
        criteria: body.criteria.unwrap_or_else(|| state.default_criteria.clone()),
    };

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    match state.aggregator.run(&request, &cancel).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(AggregateError::Cancelled) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "cancelled",
                "message": "Aggregation was cancelled",
            })),
        )
            .into_response(),
    }
}
