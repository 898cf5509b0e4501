//! # Streaming Ingestor
//!
//! Drains a chunk source into a fresh staging file inside the store root,
//! hashing exactly the bytes written. The digest is unknown until the
//! stream ends, so the staging name is a random token:
//!
//! ```text
//! <root>/.staging-<uuid>
//! ```
//!
//! Terminal outcomes of one ingestion attempt:
//!
//! | Outcome        | Staging file       | Result                    |
//! |----------------|--------------------|---------------------------|
//! | bytes > 0      | left for install   | `Ok(StagedBlob)`          |
//! | bytes == 0     | deleted            | `Err(EmptyContent)`       |
//! | source error   | deleted            | `Err(Source)`             |
//! | write error    | deleted            | `Err(Io)`                 |
//!
//! If the caller drops the ingestion future mid-stream, the staging file is
//! orphaned until [`BlobStore::sweep_staging()`](crate::BlobStore::sweep_staging)
//! reclaims it.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fileloader_core::{BlobDigest, BlobHasher, DigestAlgorithm};
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::StoreError;
use crate::observer::StoreObserver;

/// File name prefix of staging files. Never a valid hex digest or shard.
pub const STAGING_PREFIX: &str = ".staging-";

/// Destination of staged bytes.
pub(crate) trait StagingSink: AsyncWrite + Unpin + Send {
    /// Flush written data to durable storage.
    fn sync(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

impl StagingSink for fs::File {
    fn sync(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        self.sync_data()
    }
}

/// A fully written staging file awaiting install.
///
/// Only produced by [`Ingestor::ingest()`], so the digest always matches
/// the file's bytes.
#[derive(Debug)]
pub struct StagedBlob {
    path: PathBuf,
    digest: BlobDigest,
    size: u64,
}

impl StagedBlob {
    /// Path of the staging file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digest of the staged bytes.
    pub fn digest(&self) -> &BlobDigest {
        &self.digest
    }

    /// Number of bytes staged. Always positive.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Writes chunk streams to staging files.
#[derive(Clone)]
pub struct Ingestor {
    root: PathBuf,
    algorithm: DigestAlgorithm,
    observer: Arc<dyn StoreObserver>,
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("root", &self.root)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    /// Create an ingestor that stages files directly inside `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        algorithm: DigestAlgorithm,
        observer: Arc<dyn StoreObserver>,
    ) -> Self {
        Self {
            root: root.into(),
            algorithm,
            observer,
        }
    }

    /// A fresh, collision-free staging path.
    fn staging_path(&self) -> PathBuf {
        self.root
            .join(format!("{STAGING_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Drain `source` into a new staging file.
    ///
    /// Each chunk is written to disk and then fed to the hasher, in that
    /// order. Empty chunks are skipped. A chunk source error aborts the
    /// attempt with [`StoreError::Source`].
    pub async fn ingest<S, B, E>(&self, source: S) -> Result<StagedBlob, StoreError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let path = self.staging_path();
        // create_new: a staging name is never reused, even across processes.
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        self.stage(path, file, source).await
    }

    /// Drain `source` through `sink`, which writes the file at `path`.
    /// The file is removed on every outcome except success.
    pub(crate) async fn stage<W, S, B, E>(
        &self,
        path: PathBuf,
        mut sink: W,
        source: S,
    ) -> Result<StagedBlob, StoreError>
    where
        W: StagingSink,
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let mut hasher = BlobHasher::new(self.algorithm);
        let written = match write_chunks(&mut sink, source, &mut hasher).await {
            Ok(size) if size > 0 => sink.sync().await.map(|()| size).map_err(StoreError::from),
            other => other,
        };
        drop(sink);

        match written {
            Ok(0) => {
                self.discard(&path).await;
                self.observer.empty_rejected();
                Err(StoreError::EmptyContent)
            }
            Ok(size) => Ok(StagedBlob {
                path,
                digest: hasher.finalize(),
                size,
            }),
            Err(e) => {
                self.discard(&path).await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of a staging file.
    pub(crate) async fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != io::ErrorKind::NotFound {
                self.observer.cleanup_failed(path, &e);
            }
        }
    }
}

async fn write_chunks<W, S, B, E>(
    sink: &mut W,
    source: S,
    hasher: &mut BlobHasher,
) -> Result<u64, StoreError>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures::pin_mut!(source);
    let mut size = 0u64;
    while let Some(chunk) = source.next().await {
        let chunk = chunk.map_err(|e| StoreError::Source(e.to_string()))?;
        let bytes = chunk.as_ref();
        if bytes.is_empty() {
            continue;
        }
        sink.write_all(bytes).await?;
        hasher.update(bytes);
        size += bytes.len() as u64;
    }
    if size > 0 {
        sink.flush().await?;
    }
    Ok(size)
}
