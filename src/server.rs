//! HTTP surface for the pagelore service.
//!
//! Thin axum layer over [`PageService`]: handlers validate the request shape,
//! hop to a blocking thread for the synchronous pipeline, and translate
//! results into JSON. Pipeline errors surface as 500 with an `error` field;
//! malformed requests get a 400 the same way.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::service::PageService;

/// Shared handler state.
#[derive(Clone)]
pub struct ServerState {
    pub service: Arc<PageService>,
}

/// Build the service router with all routes and CORS attached.
pub fn router(service: Arc<PageService>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/reset-cache", post(reset_cache))
        .route("/analyze", post(analyze))
        .route("/ask", post(ask))
        .layer(CorsLayer::permissive())
        .with_state(ServerState { service })
}

async fn status() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Backend is running",
    }))
}

async fn reset_cache(State(state): State<ServerState>) -> Response {
    let dropped = state.service.reset_cache();
    tracing::info!(dropped, "cache cleared via API");
    Json(json!({ "status": "ok", "message": "Cache cleared" })).into_response()
}

/// Fields are optional so a missing field is a 400 with a JSON error rather
/// than axum's default extractor rejection.
#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    url: Option<String>,
}

async fn analyze(
    State(state): State<ServerState>,
    Json(request): Json<AnalyzeRequest>,
) -> Response {
    let Some(url) = non_empty(request.url) else {
        return bad_request("missing 'url' field");
    };

    let service = Arc::clone(&state.service);
    let task_url = url.clone();
    let result = tokio::task::spawn_blocking(move || service.analyze(&task_url)).await;

    match result {
        Ok(Ok(report)) => Json(json!({
            "url": url,
            "summary": report.summary,
            "num_chunks": report.num_chunks,
        }))
        .into_response(),
        Ok(Err(err)) => internal_error(&err),
        Err(join_err) => {
            tracing::error!(error = %join_err, "analyze task panicked");
            task_failure()
        }
    }
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    url: Option<String>,
    question: Option<String>,
}

async fn ask(State(state): State<ServerState>, Json(request): Json<AskRequest>) -> Response {
    let Some(url) = non_empty(request.url) else {
        return bad_request("missing 'url' field");
    };
    let Some(question) = non_empty(request.question) else {
        return bad_request("missing 'question' field");
    };

    let service = Arc::clone(&state.service);
    let task_url = url.clone();
    let task_question = question.clone();
    let result =
        tokio::task::spawn_blocking(move || service.ask(&task_url, &task_question)).await;

    match result {
        Ok(Ok(answer)) => Json(json!({
            "url": url,
            "question": question,
            "answer": answer,
        }))
        .into_response(),
        Ok(Err(err)) => internal_error(&err),
        Err(join_err) => {
            tracing::error!(error = %join_err, "ask task panicked");
            task_failure()
        }
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn internal_error(err: &crate::error::PageloreError) -> Response {
    tracing::error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

fn task_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal task failure" })),
    )
        .into_response()
}
