//! # fileloader-core — Foundational Types for the File Loader
//!
//! This crate defines the primitives every other crate in the workspace
//! builds on. It performs no I/O.
//!
//! ## Key Design Principles
//!
//! 1. **Validated digest newtype.** A [`BlobDigest`] can only be obtained by
//!    hashing bytes with a [`BlobHasher`] or by parsing caller input through
//!    [`DigestAlgorithm::parse_digest()`]. No bare strings reach path
//!    construction.
//!
//! 2. **One digest alphabet.** Digests are lowercase hexadecimal of the exact
//!    length the configured algorithm produces. Anything else is rejected
//!    with a [`ValidationError`] before a path is ever built.
//!
//! 3. **Pure path resolution.** [`ShardLayout::resolve()`] maps a digest to
//!    `<root>/<digest[0:2]>/<digest>` and nothing else.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `fileloader-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod layout;

pub use digest::{digest_bytes, BlobDigest, BlobHasher, DigestAlgorithm};
pub use error::ValidationError;
pub use layout::{BlobLocation, ShardLayout, SHARD_PREFIX_LEN};
