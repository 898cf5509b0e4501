//! # Validation Errors
//!
//! Errors raised when untrusted input (a digest from a URL path, an
//! algorithm name from configuration) fails syntactic validation.

use thiserror::Error;

/// Digest or algorithm validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The digest string was empty.
    #[error("digest is empty")]
    Empty,

    /// The digest has the wrong number of characters for its algorithm.
    #[error("digest must be {expected} hex chars, got {actual} chars")]
    WrongLength { expected: usize, actual: usize },

    /// The digest contains a character outside `[0-9a-f]`.
    #[error("digest contains invalid character {0:?}: must match [0-9a-f]")]
    InvalidCharacter(char),

    /// The algorithm name is not one of the supported algorithms.
    #[error("unknown digest algorithm {0:?}: expected one of md5, sha256")]
    UnknownAlgorithm(String),
}
