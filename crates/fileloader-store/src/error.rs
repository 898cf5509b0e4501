//! # Store Error Types
//!
//! Typed failures of the ingestor and blob store. The duplicate-install
//! collision is deliberately absent: it is a successful
//! [`InstallOutcome::Deduplicated`](crate::InstallOutcome::Deduplicated).

use fileloader_core::ValidationError;
use thiserror::Error;

/// Errors from blob store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The upload stream contained zero bytes. Nothing was persisted.
    #[error("content is empty")]
    EmptyContent,

    /// A caller-supplied digest failed the charset/length check.
    #[error("invalid digest: {0}")]
    InvalidDigest(#[from] ValidationError),

    /// No blob is stored under the digest.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The caller's chunk source failed mid-stream. The staging file was
    /// removed.
    #[error("chunk source failed: {0}")]
    Source(String),

    /// Unexpected filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store configuration rejected at startup.
    #[error("invalid store configuration: {0}")]
    Config(String),
}
