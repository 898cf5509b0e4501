//! # Store Configuration
//!
//! The explicit, enumerated settings of a [`BlobStore`](crate::BlobStore).
//! Validated once by [`BlobStore::open()`](crate::BlobStore::open).

use std::path::PathBuf;
use std::time::Duration;

use fileloader_core::DigestAlgorithm;

use crate::error::StoreError;

/// Read/write chunk size used when none is configured (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Age after which an untouched staging file counts as orphaned.
pub const DEFAULT_STAGING_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// Blob store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Storage root. Must already exist; the store only creates shard
    /// directories beneath it.
    pub root: PathBuf,
    /// Chunk size for streaming reads.
    pub chunk_size: usize,
    /// Digest algorithm addressing every blob in this root.
    pub algorithm: DigestAlgorithm,
    /// Staging files older than this are reclaimed by the sweep.
    pub staging_max_age: Duration,
}

impl StoreConfig {
    /// Settings for `root` with default chunk size, algorithm, and sweep age.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            algorithm: DigestAlgorithm::default(),
            staging_max_age: DEFAULT_STAGING_MAX_AGE,
        }
    }

    /// Override the streaming chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Override the digest algorithm.
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Override the staging sweep age.
    pub fn with_staging_max_age(mut self, max_age: Duration) -> Self {
        self.staging_max_age = max_age;
        self
    }

    /// Check the settings that do not require filesystem access.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.root.as_os_str().is_empty() {
            return Err(StoreError::Config("storage root is empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(StoreError::Config("chunk_size must be positive".into()));
        }
        Ok(())
    }
}
