use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::config::GuardConfig;
use crate::pipeline::Pipeline;

pub mod guard;
mod handlers;

/// Shared state behind the HTTP trigger endpoints.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    /// Held for the whole of a run; a second trigger gets 409.
    run_lock: Arc<tokio::sync::Mutex<()>>,
    guard: Arc<GuardConfig>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        let mut guard = pipeline.config().guard.clone();
        guard.blocked_user_agents = guard
            .blocked_user_agents
            .iter()
            .map(|needle| needle.trim().to_ascii_lowercase())
            .filter(|needle| !needle.is_empty())
            .collect();

        Self {
            pipeline: Arc::new(pipeline),
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            guard: Arc::new(guard),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let scrape = Router::new()
        .route("/api/scrapeauto", get(handlers::scrape_auto))
        .route("/api/scrapecron", get(handlers::scrape_cron))
        .route("/api/scrapeul", get(handlers::scrape_preview))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard::require_cron_secret,
        ));

    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .merge(scrape)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::block_bots,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
