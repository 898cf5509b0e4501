//! # Application State
//!
//! Shared state for the Axum application.

use fileloader_store::BlobStore;

use crate::middleware::metrics::ApiMetrics;

/// Shared application state passed to all route handlers.
///
/// Cheap to clone: the store and metrics are reference-counted internally.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The blob store backing `/files`.
    pub store: BlobStore,
    /// Metrics registry, also installed as the store's observer.
    pub metrics: ApiMetrics,
}

impl AppState {
    /// Bundle a store with the metrics instance observing it.
    pub fn new(store: BlobStore, metrics: ApiMetrics) -> Self {
        Self { store, metrics }
    }
}
