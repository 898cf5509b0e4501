//! # Blob Store
//!
//! Digest-keyed install, fetch, and remove on top of a [`ShardLayout`].
//!
//! ## Atomic Install
//!
//! `rename(2)` silently replaces an existing destination on Unix, which
//! would hide the deduplication case. Install instead hard-links the
//! staging file to its digest path: `link(2)` is atomic and fails with
//! `AlreadyExists` when the destination is present. The staging name is
//! then unlinked in every outcome. Readers therefore never observe a
//! partially written blob, and of two racing identical uploads exactly one
//! link succeeds while the other resolves to
//! [`InstallOutcome::Deduplicated`].

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use fileloader_core::{BlobDigest, DigestAlgorithm, ShardLayout};
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt, TryStreamExt};
use tokio::fs;
use tokio_util::io::ReaderStream;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::ingest::{Ingestor, StagedBlob};
use crate::observer::{StoreObserver, TracingObserver};

/// Chunks of a blob being streamed out of the store.
pub type ChunkStream = BoxStream<'static, io::Result<Bytes>>;

/// Successful result of installing a staged blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The blob is new and now visible at its digest path.
    Installed { digest: BlobDigest, size: u64 },
    /// An identical blob was already stored; the staged copy was discarded.
    Deduplicated { digest: BlobDigest, size: u64 },
}

impl InstallOutcome {
    /// The digest of the stored blob.
    pub fn digest(&self) -> &BlobDigest {
        match self {
            Self::Installed { digest, .. } | Self::Deduplicated { digest, .. } => digest,
        }
    }

    /// Number of bytes received for this install.
    pub fn size(&self) -> u64 {
        match self {
            Self::Installed { size, .. } | Self::Deduplicated { size, .. } => *size,
        }
    }

    /// Whether the blob already existed.
    pub fn is_deduplicated(&self) -> bool {
        matches!(self, Self::Deduplicated { .. })
    }
}

/// A content-addressed blob store backed by the filesystem.
///
/// Cheap to clone; clones share the observer.
#[derive(Clone)]
pub struct BlobStore {
    config: StoreConfig,
    layout: ShardLayout,
    ingestor: Ingestor,
    observer: Arc<dyn StoreObserver>,
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BlobStore {
    /// Open a store with the default [`TracingObserver`].
    ///
    /// Validates `config` and checks that the root is an existing
    /// directory. The root is never created here.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        Self::open_with_observer(config, Arc::new(TracingObserver))
    }

    /// Open a store reporting events to `observer`.
    pub fn open_with_observer(
        config: StoreConfig,
        observer: Arc<dyn StoreObserver>,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        match std::fs::metadata(&config.root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(StoreError::Config(format!(
                    "storage root {} is not a directory",
                    config.root.display()
                )))
            }
            Err(e) => {
                return Err(StoreError::Config(format!(
                    "storage root {} is not accessible: {e}",
                    config.root.display()
                )))
            }
        }

        let layout = ShardLayout::new(config.root.clone());
        let ingestor = Ingestor::new(config.root.clone(), config.algorithm, observer.clone());
        Ok(Self {
            config,
            layout,
            ingestor,
            observer,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The directory layout.
    pub fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    /// The digest algorithm addressing this store.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.config.algorithm
    }

    pub(crate) fn observer(&self) -> &dyn StoreObserver {
        self.observer.as_ref()
    }

    /// Validate an untrusted digest against this store's algorithm.
    pub fn parse_digest(&self, raw: &str) -> Result<BlobDigest, StoreError> {
        Ok(self.config.algorithm.parse_digest(raw)?)
    }

    /// Stream `source` into a staging file. See [`Ingestor::ingest()`].
    pub async fn ingest<S, B, E>(&self, source: S) -> Result<StagedBlob, StoreError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        self.ingestor.ingest(source).await
    }

    /// Make a staged blob visible at its digest path, or discard it if an
    /// identical blob is already stored.
    ///
    /// The staging file is removed in every outcome.
    pub async fn install(&self, staged: StagedBlob) -> Result<InstallOutcome, StoreError> {
        let digest = staged.digest().clone();
        let size = staged.size();
        let location = self.layout.resolve(&digest);

        // create_dir, not create_dir_all: the root itself must already exist.
        match fs::create_dir(&location.shard_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                self.ingestor.discard(staged.path()).await;
                return Err(e.into());
            }
        }

        let linked = fs::hard_link(staged.path(), &location.path).await;
        self.ingestor.discard(staged.path()).await;

        match linked {
            Ok(()) => {
                self.observer.installed(&digest, size);
                Ok(InstallOutcome::Installed { digest, size })
            }
            // Content-addressed: identical digest means identical content.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                self.observer.deduplicated(&digest, size);
                Ok(InstallOutcome::Deduplicated { digest, size })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ingest `source` and install the result.
    pub async fn put<S, B, E>(&self, source: S) -> Result<InstallOutcome, StoreError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let staged = self.ingest(source).await?;
        self.install(staged).await
    }

    /// Look up a blob for streaming.
    ///
    /// The digest is validated before any filesystem access. Existence is
    /// checked now; the file is opened only when the returned reader's
    /// stream is first polled.
    pub async fn fetch(&self, raw_digest: &str) -> Result<BlobReader, StoreError> {
        let digest = self.parse_digest(raw_digest)?;
        let location = self.layout.resolve(&digest);

        match fs::metadata(&location.path).await {
            Ok(meta) if meta.is_file() => Ok(BlobReader {
                digest,
                path: location.path,
                size: meta.len(),
                chunk_size: self.config.chunk_size,
            }),
            Ok(_) => Err(StoreError::NotFound(digest.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(digest.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob. Its shard directory is left in place.
    pub async fn remove(&self, raw_digest: &str) -> Result<(), StoreError> {
        let digest = self.parse_digest(raw_digest)?;
        let location = self.layout.resolve(&digest);

        match fs::remove_file(&location.path).await {
            Ok(()) => {
                self.observer.removed(&digest);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(digest.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// A stored blob located by [`BlobStore::fetch()`], not yet opened.
#[derive(Debug, Clone)]
pub struct BlobReader {
    digest: BlobDigest,
    path: std::path::PathBuf,
    size: u64,
    chunk_size: usize,
}

impl BlobReader {
    /// Digest of the blob.
    pub fn digest(&self) -> &BlobDigest {
        &self.digest
    }

    /// Size of the blob when it was located.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Open the blob and yield it in chunks of at most `chunk_size` bytes.
    ///
    /// A blob deleted between `fetch()` and the first poll yields a single
    /// `NotFound` I/O error; one deleted mid-read may end early.
    pub fn into_stream(self) -> ChunkStream {
        let chunk_size = self.chunk_size;
        stream::once(fs::File::open(self.path))
            .map_ok(move |file| ReaderStream::with_capacity(file, chunk_size))
            .try_flatten()
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn store(root: &Path) -> BlobStore {
        BlobStore::open(StoreConfig::new(root)).unwrap()
    }

    fn once(data: &'static [u8]) -> impl Stream<Item = Result<Bytes, io::Error>> {
        stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    #[test]
    fn open_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = BlobStore::open(StoreConfig::new(dir.path().join("nope"))).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn open_rejects_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        let err = BlobStore::open(StoreConfig::new(&file)).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn open_does_not_create_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("absent");
        let _ = BlobStore::open(StoreConfig::new(&root));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn install_outcome_accessors() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let first = s.put(once(b"abc")).await.unwrap();
        assert!(!first.is_deduplicated());
        assert_eq!(first.size(), 3);
        let second = s.put(once(b"abc")).await.unwrap();
        assert!(second.is_deduplicated());
        assert_eq!(first.digest(), second.digest());
    }

    #[tokio::test]
    async fn install_into_existing_shard_dir() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        std::fs::create_dir(dir.path().join("5e")).unwrap();
        let outcome = s.put(once(b"hello world")).await.unwrap();
        assert!(matches!(outcome, InstallOutcome::Installed { .. }));
    }

    #[tokio::test]
    async fn install_fails_when_shard_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        // A regular file squatting on the shard name makes the link fail
        // with something other than AlreadyExists.
        std::fs::write(dir.path().join("5e"), b"squatter").unwrap();
        let err = s.put(once(b"hello world")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)), "got {err:?}");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["5e".to_string()]);
    }

    #[tokio::test]
    async fn fetch_directory_at_blob_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let hex = "5eb63bbbe01eeed093cb22bb8f5acdc3";
        std::fs::create_dir_all(dir.path().join("5e").join(hex)).unwrap();
        assert!(matches!(s.fetch(hex).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn reader_reports_size_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        s.put(once(b"hello world")).await.unwrap();
        let reader = s.fetch("5eb63bbbe01eeed093cb22bb8f5acdc3").await.unwrap();
        assert_eq!(reader.size(), 11);
        assert_eq!(reader.digest(), &"5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[tokio::test]
    async fn stream_after_delete_yields_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        s.put(once(b"transient")).await.unwrap();
        let digest = fileloader_core::digest_bytes(DigestAlgorithm::Md5, b"transient");
        let reader = s.fetch(digest.as_str()).await.unwrap();
        s.remove(digest.as_str()).await.unwrap();

        let mut chunks = reader.into_stream();
        let first = chunks.next().await.unwrap();
        assert_eq!(first.unwrap_err().kind(), io::ErrorKind::NotFound);
        assert!(chunks.next().await.is_none());
    }
}
