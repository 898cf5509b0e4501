//! # Staging Sweep
//!
//! Uploads cancelled mid-stream leave their staging file behind. Nothing on
//! the request path reclaims them, so a periodic sweep deletes staging files
//! whose modification time is older than a bounded age.
//!
//! Only files directly in the root whose name starts with
//! [`STAGING_PREFIX`] are considered. Shard directories and blobs are
//! never touched.

use std::io;
use std::time::{Duration, SystemTime};

use tokio::fs;

use crate::error::StoreError;
use crate::ingest::STAGING_PREFIX;
use crate::store::BlobStore;

/// Result of one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Staging files deleted.
    pub removed: usize,
    /// Staging files that were due but could not be inspected or deleted.
    pub failed: usize,
}

impl BlobStore {
    /// Delete staging files last modified at least `max_age` ago.
    pub async fn sweep_staging(&self, max_age: Duration) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();
        let now = SystemTime::now();
        let mut entries = fs::read_dir(self.layout().root()).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let is_staging = name
                .to_str()
                .map(|n| n.starts_with(STAGING_PREFIX))
                .unwrap_or(false);
            if !is_staging {
                continue;
            }

            let path = entry.path();
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Installed or discarded since read_dir listed it.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    self.observer().cleanup_failed(&path, &e);
                    report.failed += 1;
                    continue;
                }
            };
            if !meta.is_file() {
                continue;
            }

            // Clock skew (mtime in the future) counts as age zero.
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match fs::remove_file(&path).await {
                Ok(()) => {
                    self.observer().staging_swept(&path);
                    report.removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    self.observer().cleanup_failed(&path, &e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Run [`sweep_staging()`](Self::sweep_staging) every `interval` with the
    /// configured `staging_max_age`. Never returns; abort the task to stop.
    pub async fn sweep_periodically(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.sweep_staging(self.config().staging_max_age).await {
                Ok(report) if report.removed > 0 || report.failed > 0 => {
                    tracing::info!(
                        removed = report.removed,
                        failed = report.failed,
                        "staging sweep finished"
                    );
                }
                Ok(_) => tracing::debug!("staging sweep found nothing to remove"),
                Err(e) => tracing::warn!(error = %e, "staging sweep failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use bytes::Bytes;
    use futures::stream;

    fn store(root: &std::path::Path) -> BlobStore {
        BlobStore::open(StoreConfig::new(root)).unwrap()
    }

    #[tokio::test]
    async fn sweep_removes_old_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        std::fs::write(dir.path().join(format!("{STAGING_PREFIX}orphan-1")), b"a").unwrap();
        std::fs::write(dir.path().join(format!("{STAGING_PREFIX}orphan-2")), b"b").unwrap();

        let report = s.sweep_staging(Duration::ZERO).await.unwrap();
        assert_eq!(report, SweepReport { removed: 2, failed: 0 });
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn sweep_keeps_recent_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let fresh = dir.path().join(format!("{STAGING_PREFIX}in-flight"));
        std::fs::write(&fresh, b"still uploading").unwrap();

        let report = s.sweep_staging(Duration::from_secs(3600)).await.unwrap();
        assert_eq!(report.removed, 0);
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn sweep_never_touches_blobs_or_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        s.put(stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"keep me"))]))
            .await
            .unwrap();
        std::fs::write(dir.path().join("README"), b"operator notes").unwrap();
        std::fs::create_dir(dir.path().join(format!("{STAGING_PREFIX}dir"))).unwrap();

        let report = s.sweep_staging(Duration::ZERO).await.unwrap();
        assert_eq!(report.removed, 0);
        assert!(dir.path().join("README").exists());
        assert!(dir.path().join(format!("{STAGING_PREFIX}dir")).is_dir());

        let digest = fileloader_core::digest_bytes(s.algorithm(), b"keep me");
        assert!(s.layout().resolve(&digest).path.is_file());
    }
}
