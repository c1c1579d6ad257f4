use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse as _, Response};

use super::AppState;

pub(super) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": message.into(),
    });
    (status, Json(body)).into_response()
}

pub(super) async fn scrape_auto(State(state): State<AppState>) -> Response {
    run(&state, "auto").await
}

pub(super) async fn scrape_cron(State(state): State<AppState>) -> Response {
    run(&state, "cron").await
}

pub(super) async fn scrape_preview(State(state): State<AppState>) -> Response {
    match state.pipeline.preview().await {
        Ok(rows) => Json(serde_json::json!({ "rows": rows })).into_response(),
        Err(err) => {
            tracing::error!(?err, "preview failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
        }
    }
}

/// Runs the pipeline on its own task, which keeps going if the caller hangs
/// up. That task holds the run lock until the run finishes.
async fn run(state: &AppState, origin: &'static str) -> Response {
    let Ok(running) = Arc::clone(&state.run_lock).try_lock_owned() else {
        tracing::info!(origin, "run already in progress");
        return error_response(StatusCode::CONFLICT, "a run is already in progress");
    };

    let pipeline = Arc::clone(&state.pipeline);
    let task = tokio::spawn(async move {
        let result = pipeline.run(origin).await;
        drop(running);
        result
    });

    match task.await {
        Ok(Ok(summary)) => Json(summary).into_response(),
        Ok(Err(err)) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        Err(err) => {
            tracing::error!(?err, origin, "run task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "run task failed")
        }
    }
}
