//! # Store Observer
//!
//! Telemetry seam for the store. Every notable outcome is reported to an
//! injected [`StoreObserver`] instead of a process-wide logger, so callers
//! decide where events go: [`TracingObserver`] by default, a metrics
//! recorder in the API, a recording observer in tests.

use std::io;
use std::path::Path;

use fileloader_core::BlobDigest;

/// Receiver for blob store events.
///
/// All methods default to no-ops. Implementations must be cheap: they are
/// called inline on the request path.
pub trait StoreObserver: Send + Sync {
    /// A new blob was installed at its digest path.
    fn installed(&self, _digest: &BlobDigest, _size: u64) {}

    /// A blob with this digest already existed; the staged copy was dropped.
    fn deduplicated(&self, _digest: &BlobDigest, _size: u64) {}

    /// A blob was removed.
    fn removed(&self, _digest: &BlobDigest) {}

    /// An upload carried zero bytes and was discarded.
    fn empty_rejected(&self) {}

    /// An orphaned staging file was deleted by the sweep.
    fn staging_swept(&self, _path: &Path) {}

    /// A staging file could not be deleted.
    fn cleanup_failed(&self, _path: &Path, _error: &io::Error) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StoreObserver for NoopObserver {}

/// Observer that emits structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StoreObserver for TracingObserver {
    fn installed(&self, digest: &BlobDigest, size: u64) {
        tracing::info!(digest = %digest, size, "blob installed");
    }

    fn deduplicated(&self, digest: &BlobDigest, size: u64) {
        tracing::info!(digest = %digest, size, "blob already stored, staged copy discarded");
    }

    fn removed(&self, digest: &BlobDigest) {
        tracing::info!(digest = %digest, "blob removed");
    }

    fn empty_rejected(&self) {
        tracing::warn!("empty upload rejected");
    }

    fn staging_swept(&self, path: &Path) {
        tracing::info!(path = %path.display(), "orphaned staging file removed");
    }

    fn cleanup_failed(&self, path: &Path, error: &io::Error) {
        tracing::warn!(path = %path.display(), error = %error, "failed to remove staging file");
    }
}
