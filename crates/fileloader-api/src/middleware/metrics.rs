//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Blob-level counters are driven by the store: [`ApiMetrics`]
//! is the [`StoreObserver`] handed to the [`BlobStore`](fileloader_store::BlobStore),
//! and forwards every event to [`TracingObserver`] as well.
//!
//! The registry is owned by the metrics instance, never process-global, so
//! each test app starts from zero.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use fileloader_core::BlobDigest;
use fileloader_store::{StoreObserver, TracingObserver};
use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Label substituted for digest path segments.
const DIGEST_LABEL: &str = "{digest}";

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Store events --
    blobs_installed_total: IntCounter,
    blobs_deduplicated_total: IntCounter,
    blobs_removed_total: IntCounter,
    bytes_ingested_total: IntCounter,
    staging_swept_total: IntCounter,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a metrics instance with a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("fileloader_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "fileloader_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ]),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("fileloader_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )?;

        let blobs_installed_total = IntCounter::new(
            "fileloader_blobs_installed_total",
            "Blobs newly installed at their digest path",
        )?;
        let blobs_deduplicated_total = IntCounter::new(
            "fileloader_blobs_deduplicated_total",
            "Uploads whose digest was already stored",
        )?;
        let blobs_removed_total =
            IntCounter::new("fileloader_blobs_removed_total", "Blobs deleted")?;
        let bytes_ingested_total = IntCounter::new(
            "fileloader_bytes_ingested_total",
            "Bytes received in successful uploads, including duplicates",
        )?;
        let staging_swept_total = IntCounter::new(
            "fileloader_staging_swept_total",
            "Orphaned staging files removed by the sweep",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(blobs_installed_total.clone()))?;
        registry.register(Box::new(blobs_deduplicated_total.clone()))?;
        registry.register(Box::new(blobs_removed_total.clone()))?;
        registry.register(Box::new(bytes_ingested_total.clone()))?;
        registry.register(Box::new(staging_swept_total.clone()))?;

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                blobs_installed_total,
                blobs_deduplicated_total,
                blobs_removed_total,
                bytes_ingested_total,
                staging_swept_total,
            }),
        })
    }

    /// Return current total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counters(&self.inner.http_requests_total)
    }

    /// Return current total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counters(&self.inner.http_errors_total)
    }

    /// Blobs installed so far.
    pub fn blobs_installed(&self) -> u64 {
        self.inner.blobs_installed_total.get()
    }

    /// Duplicate uploads so far.
    pub fn blobs_deduplicated(&self) -> u64 {
        self.inner.blobs_deduplicated_total.get()
    }

    /// Record an HTTP request (called by the middleware).
    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn sum_counters(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

impl StoreObserver for ApiMetrics {
    fn installed(&self, digest: &BlobDigest, size: u64) {
        self.inner.blobs_installed_total.inc();
        self.inner.bytes_ingested_total.inc_by(size);
        TracingObserver.installed(digest, size);
    }

    fn deduplicated(&self, digest: &BlobDigest, size: u64) {
        self.inner.blobs_deduplicated_total.inc();
        self.inner.bytes_ingested_total.inc_by(size);
        TracingObserver.deduplicated(digest, size);
    }

    fn removed(&self, digest: &BlobDigest) {
        self.inner.blobs_removed_total.inc();
        TracingObserver.removed(digest);
    }

    fn empty_rejected(&self) {
        TracingObserver.empty_rejected();
    }

    fn staging_swept(&self, path: &Path) {
        self.inner.staging_swept_total.inc();
        TracingObserver.staging_swept(path);
    }

    fn cleanup_failed(&self, path: &Path, error: &io::Error) {
        TracingObserver.cleanup_failed(path, error);
    }
}

/// Normalize a request path so blob digests do not become label values.
///
/// The segment after `files` is always replaced, valid or not, along with
/// any other segment shaped like an MD5 or SHA-256 hex digest.
fn normalize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let is_digest = (previous == "files" && !segment.is_empty())
                || (matches!(segment.len(), 32 | 64)
                    && segment.chars().all(|c| c.is_ascii_hexdigit()));
            previous = segment;
            if is_digest {
                DIGEST_LABEL
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileloader_core::{digest_bytes, DigestAlgorithm};

    #[test]
    fn new_starts_at_zero() {
        let m = ApiMetrics::new().unwrap();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
        assert_eq!(m.blobs_installed(), 0);
    }

    #[test]
    fn errors_counted_separately() {
        let m = ApiMetrics::new().unwrap();
        for _ in 0..5 {
            m.record_request("GET", "/files/{digest}", 200, 0.01);
        }
        m.record_request("GET", "/files/{digest}", 404, 0.01);
        m.record_request("POST", "/files", 400, 0.05);
        assert_eq!(m.requests(), 7);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn clone_shares_underlying_counters() {
        let m = ApiMetrics::new().unwrap();
        let clone = m.clone();
        m.record_request("GET", "/health/liveness", 200, 0.001);
        assert_eq!(clone.requests(), 1);
    }

    #[test]
    fn store_events_drive_blob_counters() {
        let m = ApiMetrics::new().unwrap();
        let d = digest_bytes(DigestAlgorithm::Md5, b"hello world");
        m.installed(&d, 11);
        m.deduplicated(&d, 11);
        m.removed(&d);
        m.staging_swept(Path::new("/tmp/.staging-x"));

        assert_eq!(m.blobs_installed(), 1);
        assert_eq!(m.blobs_deduplicated(), 1);
        let text = m.gather_and_encode().unwrap();
        assert!(text.contains("fileloader_bytes_ingested_total 22"));
        assert!(text.contains("fileloader_blobs_removed_total 1"));
        assert!(text.contains("fileloader_staging_swept_total 1"));
    }

    #[test]
    fn separate_instances_do_not_share_registry() {
        let a = ApiMetrics::new().unwrap();
        let b = ApiMetrics::new().unwrap();
        a.record_request("GET", "/", 200, 0.0);
        assert_eq!(b.requests(), 0);
    }

    #[test]
    fn gather_and_encode_produces_text() {
        let m = ApiMetrics::new().unwrap();
        m.record_request("GET", "/files/{digest}", 200, 0.01);
        let output = m.gather_and_encode().unwrap();
        assert!(output.contains("fileloader_http_requests_total"));
        assert!(output.contains("fileloader_http_request_duration_seconds"));
    }

    #[test]
    fn normalize_path_replaces_file_segment() {
        assert_eq!(
            normalize_path("/files/5eb63bbbe01eeed093cb22bb8f5acdc3"),
            "/files/{digest}"
        );
        assert_eq!(normalize_path("/files/NotADigest"), "/files/{digest}");
    }

    #[test]
    fn normalize_path_replaces_hex_digests_elsewhere() {
        let sha = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(normalize_path(&format!("/x/{sha}")), "/x/{digest}");
    }

    #[test]
    fn normalize_path_preserves_static_segments() {
        assert_eq!(normalize_path("/files"), "/files");
        assert_eq!(normalize_path("/health/readiness"), "/health/readiness");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }
}
