//! # fileloader-store — Content-Addressed Blob Store
//!
//! Stores arbitrary byte streams under `<root>/<digest[0:2]>/<digest>` and
//! serves them back or removes them by digest.
//!
//! ## Components
//!
//! - [`Ingestor`] streams chunks into a uniquely named staging file while
//!   feeding the same bytes to a [`BlobHasher`](fileloader_core::BlobHasher).
//! - [`BlobStore`] installs staged blobs atomically (create-if-absent, so an
//!   existing blob wins and the new copy is discarded), streams blobs back
//!   in fixed-size chunks, and removes them.
//! - [`BlobStore::sweep_staging()`] reclaims staging files orphaned by
//!   cancelled uploads.
//!
//! ## Invariants
//!
//! - No zero-length blob is ever installed.
//! - At most one file exists per digest, and its bytes hash to that digest.
//! - A blob path only ever appears fully written.
//! - Caller-supplied digests are validated before any path is built.
//!
//! There is no shared in-memory state: concurrent requests coordinate purely
//! through filesystem atomicity.

pub mod config;
pub mod error;
pub mod ingest;
pub mod observer;
pub mod store;
pub mod sweep;

pub use config::StoreConfig;
pub use error::StoreError;
pub use ingest::{Ingestor, StagedBlob, STAGING_PREFIX};
pub use observer::{NoopObserver, StoreObserver, TracingObserver};
pub use store::{BlobReader, BlobStore, ChunkStream, InstallOutcome};
pub use sweep::SweepReport;
