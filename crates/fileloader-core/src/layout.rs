//! # Shard Layout — Digest Path Resolver
//!
//! Maps a [`BlobDigest`] to its on-disk location:
//!
//! ```text
//! <root>/<digest[0:2]>/<digest>
//! ```
//!
//! The two-character shard prefix bounds fanout at 256 top-level
//! directories for hex digests. Resolution is pure: it never touches the
//! filesystem, and it only accepts an already-validated `BlobDigest`, so no
//! caller-controlled string can reach `Path::join`.

use std::path::{Path, PathBuf};

use crate::digest::BlobDigest;

/// Number of leading digest characters that name the shard directory.
pub const SHARD_PREFIX_LEN: usize = 2;

/// Resolved on-disk location of a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    /// `<root>/<shard>` — created on demand by the store.
    pub shard_dir: PathBuf,
    /// `<root>/<shard>/<digest>` — the blob file itself.
    pub path: PathBuf,
}

/// The directory layout of a blob store rooted at a fixed path.
#[derive(Debug, Clone)]
pub struct ShardLayout {
    root: PathBuf,
}

impl ShardLayout {
    /// Create a layout rooted at `root`. The directory is not touched.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory of this layout.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the shard directory and blob path for `digest`.
    pub fn resolve(&self, digest: &BlobDigest) -> BlobLocation {
        let shard_dir = self.root.join(digest.shard());
        let path = shard_dir.join(digest.as_str());
        BlobLocation { shard_dir, path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{digest_bytes, DigestAlgorithm};

    #[test]
    fn resolve_hello_world_md5() {
        let layout = ShardLayout::new("/srv/storage");
        let digest = digest_bytes(DigestAlgorithm::Md5, b"hello world");
        let loc = layout.resolve(&digest);

        assert_eq!(loc.shard_dir, PathBuf::from("/srv/storage/5e"));
        assert_eq!(
            loc.path,
            PathBuf::from("/srv/storage/5e/5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
    }

    #[test]
    fn resolve_normalizes_uppercase_input() {
        let layout = ShardLayout::new("/data");
        let digest = DigestAlgorithm::Md5
            .parse_digest("5EB63BBBE01EEED093CB22BB8F5ACDC3")
            .unwrap();
        let loc = layout.resolve(&digest);
        assert_eq!(loc.shard_dir, PathBuf::from("/data/5e"));
    }

    #[test]
    fn blob_path_is_inside_shard_dir() {
        let layout = ShardLayout::new("relative/root");
        let digest = digest_bytes(DigestAlgorithm::Sha256, b"abc");
        let loc = layout.resolve(&digest);
        assert_eq!(loc.path.parent(), Some(loc.shard_dir.as_path()));
        assert_eq!(loc.shard_dir.parent(), Some(layout.root()));
    }

    #[test]
    fn root_accessor() {
        let layout = ShardLayout::new("/x");
        assert_eq!(layout.root(), Path::new("/x"));
    }
}
