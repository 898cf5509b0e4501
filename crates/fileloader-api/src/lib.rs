//! # fileloader-api — HTTP Boundary for the Blob Store
//!
//! Translates HTTP requests into [`BlobStore`](fileloader_store::BlobStore)
//! operations and store errors into JSON error envelopes.
//!
//! ## API Surface
//!
//! | Path                 | Module               | Purpose                    |
//! |----------------------|----------------------|----------------------------|
//! | `/files`, `/files/*` | [`routes::files`]    | Upload, download, delete   |
//! | `/health/*`          | [`routes::health`]   | Liveness and readiness     |
//! | `/metrics`           | this module          | Prometheus scrape          |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod process;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::AppState;

use axum::extract::State;
use axum::http::{header, Uri};
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .merge(routes::files::router())
        .merge(routes::health::router())
        .route("/metrics", get(prometheus_metrics))
        .fallback(route_not_found)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /metrics — Prometheus metrics scrape endpoint.
async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.gather_and_encode().map_err(AppError::Internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}

/// Unmatched routes get the same JSON envelope as every other error.
async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
