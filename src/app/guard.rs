use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest as _, Sha256};

use super::AppState;
use super::handlers::error_response;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Refuses requests from crawler user agents on every route.
pub async fn block_bots(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);

    if let Some(user_agent) = user_agent
        && let Some(blocked) = state
            .guard
            .blocked_user_agents
            .iter()
            .find(|needle| user_agent.contains(needle.as_str()))
    {
        tracing::info!(%user_agent, %blocked, "refused bot request");
        return error_response(StatusCode::FORBIDDEN, "forbidden");
    }

    next.run(request).await
}

/// Requires the configured cron secret on the scrape endpoints.
pub async fn require_cron_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.guard.cron_secret.as_deref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "cron secret is not configured",
        );
    };

    let authorized = request
        .headers()
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|provided| secrets_match(provided, expected));

    if !authorized {
        tracing::warn!(path = %request.uri().path(), "rejected trigger without valid secret");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    next.run(request).await
}

fn secrets_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}
