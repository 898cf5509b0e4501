//! # Health Probes
//!
//! Unauthenticated liveness and readiness endpoints for orchestrators.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Build the health probe router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
}

/// Liveness probe — the process is up and serving.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — the storage root is still a reachable directory.
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match tokio::fs::metadata(state.store.layout().root()).await {
        Ok(meta) if meta.is_dir() => (StatusCode::OK, "ready").into_response(),
        Ok(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage root is not a directory").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "storage root health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage root unavailable").into_response()
        }
    }
}
