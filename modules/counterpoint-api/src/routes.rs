//! REST handlers: health, taxonomy, corpus stats, and the blocking query
//! endpoint. The streaming variant lives in `stream`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use counterpoint_common::{Query, TOPIC_TAXONOMY};

use crate::AppState;

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let corpus_loaded = state.store.is_loaded();
    let api_key_configured = state.config.api_key_configured();
    let status = if corpus_loaded && api_key_configured {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "corpus_loaded": corpus_loaded,
        "api_key_configured": api_key_configured,
    }))
}

pub(crate) async fn topics() -> impl IntoResponse {
    let topics: Vec<_> = TOPIC_TAXONOMY
        .iter()
        .map(|(name, keywords)| json!({ "name": name, "keywords": keywords }))
        .collect();
    Json(json!({ "topics": topics }))
}

pub(crate) async fn stats(State(state): State<Arc<AppState>>) -> Response {
    if !state.store.is_loaded() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "corpus is not loaded" })),
        )
            .into_response();
    }
    Json(state.store.stats()).into_response()
}

/// Run the whole pipeline and reply once with the aggregate result.
pub(crate) async fn query(
    State(state): State<Arc<AppState>>,
    Json(query): Json<Query>,
) -> Response {
    if let Some(rejection) = reject_query(&state, &query) {
        return rejection;
    }

    let request_id = Uuid::new_v4();
    info!(%request_id, belief = %query.belief, "query received");
    let result = state.pipeline.submit(query).await;
    info!(%request_id, success = result.metadata.success, "query finished");

    if result.metadata.success {
        Json(result).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": result.metadata.errors.join("; "),
                "result": result,
            })),
        )
            .into_response()
    }
}

fn reject_query(state: &AppState, query: &Query) -> Option<Response> {
    if !state.config.api_key_configured() {
        return Some(
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "OPENROUTER_API_KEY is not configured" })),
            )
                .into_response(),
        );
    }
    if query.belief.trim().is_empty() {
        return Some(
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "belief must not be empty" })),
            )
                .into_response(),
        );
    }
    None
}
