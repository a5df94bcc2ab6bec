use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::data_models::params::KEYWORDS;
use crate::feed::FeedClient;

use super::models::ErrorResponse;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// GET /api/search: search parameters in the query string, passed through
/// to the feed verbatim. Responds with the translated JSON mapping.
pub async fn search_get(
    State(feed): State<Arc<FeedClient>>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    run_search(&feed, query).await
}

/// POST /api/search: search parameters as a flat JSON string map in the
/// body; query-string parameters overlay the body and win on collision.
pub async fn search_post(
    State(feed): State<Arc<FeedClient>>,
    Query(query): Query<BTreeMap<String, String>>,
    Json(body): Json<BTreeMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let mut merged = body;
    merged.extend(query);
    run_search(&feed, merged).await
}

async fn run_search(
    feed: &FeedClient,
    search_params: BTreeMap<String, String>,
) -> Result<Json<Value>, ApiError> {
    let keyword = search_params
        .get(KEYWORDS)
        .map(|k| k.trim())
        .unwrap_or_default();
    if keyword.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Keywords cannot be empty"));
    }

    let page = feed
        .fetch_value(&search_params)
        .await
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(page))
}
