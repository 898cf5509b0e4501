//! # Blob Digests — Content-Addressed Identifiers
//!
//! Defines [`DigestAlgorithm`], the validated [`BlobDigest`] newtype, and the
//! incremental [`BlobHasher`] used while a blob is streamed to disk.
//!
//! ## Security Invariant
//!
//! A `BlobDigest` is either computed locally from bytes or parsed from
//! caller input through [`DigestAlgorithm::parse_digest()`], which accepts
//! only lowercase hex of the algorithm's exact output length. Uppercase
//! input is normalized; everything else (`/`, `.`, `%`, non-ASCII) is
//! rejected. A `BlobDigest` is therefore always safe to use as a path
//! component.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// The hash algorithm used to address blobs.
///
/// `Md5` is the default and matches the 32-character identifiers issued by
/// existing deployments. `Sha256` produces 64-character identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5 — 16-byte digest, 32 hex chars.
    #[default]
    Md5,
    /// SHA-256 — 32-byte digest, 64 hex chars.
    Sha256,
}

impl DigestAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    /// Number of lowercase hex characters in a digest of this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }

    /// Start an incremental hash computation.
    pub fn hasher(&self) -> BlobHasher {
        BlobHasher::new(*self)
    }

    /// Validate and normalize an untrusted digest string.
    ///
    /// Uppercase hex is lowercased. The result must be exactly
    /// [`hex_len()`](Self::hex_len) characters of `[0-9a-f]`.
    pub fn parse_digest(&self, raw: &str) -> Result<BlobDigest, ValidationError> {
        let hex = validate_digest_hex(*self, raw)?;
        Ok(BlobDigest {
            algorithm: *self,
            hex,
        })
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            _ => Err(ValidationError::UnknownAlgorithm(s.to_string())),
        }
    }
}

fn validate_digest_hex(algorithm: DigestAlgorithm, raw: &str) -> Result<String, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::Empty);
    }
    // Charset first: after this every char is one ASCII byte, so `len()`
    // below counts characters.
    if let Some(c) = raw.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidCharacter(c));
    }
    let expected = algorithm.hex_len();
    if raw.len() != expected {
        return Err(ValidationError::WrongLength {
            expected,
            actual: raw.len(),
        });
    }
    Ok(raw.to_ascii_lowercase())
}

/// A validated, lowercase hex content digest tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl BlobDigest {
    /// The algorithm that produced this digest.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The digest as lowercase hex.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// The shard prefix: the first two hex characters.
    pub fn shard(&self) -> &str {
        &self.hex[..crate::layout::SHARD_PREFIX_LEN]
    }
}

impl fmt::Display for BlobDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl AsRef<str> for BlobDigest {
    fn as_ref(&self) -> &str {
        &self.hex
    }
}

impl PartialEq<&str> for BlobDigest {
    fn eq(&self, other: &&str) -> bool {
        self.hex == *other
    }
}

impl PartialEq<str> for BlobDigest {
    fn eq(&self, other: &str) -> bool {
        self.hex == other
    }
}

/// Incremental hasher fed chunk by chunk during ingestion.
pub struct BlobHasher {
    inner: HasherState,
}

enum HasherState {
    Md5(Md5),
    Sha256(Sha256),
}

impl BlobHasher {
    /// Create a fresh hasher for `algorithm`.
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        let inner = match algorithm {
            DigestAlgorithm::Md5 => HasherState::Md5(Md5::new()),
            DigestAlgorithm::Sha256 => HasherState::Sha256(Sha256::new()),
        };
        Self { inner }
    }

    /// The algorithm this hasher computes.
    pub fn algorithm(&self) -> DigestAlgorithm {
        match self.inner {
            HasherState::Md5(_) => DigestAlgorithm::Md5,
            HasherState::Sha256(_) => DigestAlgorithm::Sha256,
        }
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        match &mut self.inner {
            HasherState::Md5(h) => h.update(chunk),
            HasherState::Sha256(h) => h.update(chunk),
        }
    }

    /// Consume the hasher and produce the digest.
    pub fn finalize(self) -> BlobDigest {
        let algorithm = self.algorithm();
        let hex = match self.inner {
            HasherState::Md5(h) => to_hex(&h.finalize()),
            HasherState::Sha256(h) => to_hex(&h.finalize()),
        };
        BlobDigest { algorithm, hex }
    }
}

impl fmt::Debug for BlobHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobHasher")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// Compute the digest of an in-memory byte slice.
pub fn digest_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> BlobDigest {
    let mut hasher = algorithm.hasher();
    hasher.update(data);
    hasher.finalize()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn md5_known_vector() {
        let d = digest_bytes(DigestAlgorithm::Md5, b"hello world");
        assert_eq!(d, HELLO_MD5);
        assert_eq!(d.algorithm(), DigestAlgorithm::Md5);
    }

    #[test]
    fn sha256_known_vector() {
        let d = digest_bytes(DigestAlgorithm::Sha256, b"hello world");
        assert_eq!(d, HELLO_SHA256);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = DigestAlgorithm::Md5.hasher();
        h.update(b"hello");
        h.update(b" ");
        h.update(b"world");
        assert_eq!(h.finalize(), HELLO_MD5);
    }

    #[test]
    fn empty_input_vectors() {
        assert_eq!(
            digest_bytes(DigestAlgorithm::Md5, b""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            digest_bytes(DigestAlgorithm::Sha256, b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn parse_digest_accepts_valid() {
        let d = DigestAlgorithm::Md5.parse_digest(HELLO_MD5).unwrap();
        assert_eq!(d.as_str(), HELLO_MD5);
        assert_eq!(d.shard(), "5e");
    }

    #[test]
    fn parse_digest_lowercases() {
        let d = DigestAlgorithm::Md5
            .parse_digest("5EB63BBBE01EEED093CB22BB8F5ACDC3")
            .unwrap();
        assert_eq!(d, HELLO_MD5);
    }

    #[test]
    fn parse_digest_rejects_empty() {
        assert_eq!(
            DigestAlgorithm::Md5.parse_digest(""),
            Err(ValidationError::Empty)
        );
    }

    #[test]
    fn parse_digest_rejects_wrong_length() {
        assert_eq!(
            DigestAlgorithm::Md5.parse_digest("abc123"),
            Err(ValidationError::WrongLength {
                expected: 32,
                actual: 6
            })
        );
        // A valid MD5 is the wrong length for SHA-256.
        assert!(DigestAlgorithm::Sha256.parse_digest(HELLO_MD5).is_err());
    }

    #[test]
    fn parse_digest_rejects_traversal() {
        assert_eq!(
            DigestAlgorithm::Md5.parse_digest("../../etc/passwd"),
            Err(ValidationError::InvalidCharacter('.'))
        );
        assert_eq!(
            DigestAlgorithm::Md5.parse_digest("5e/b63bbbe01eeed093cb22bb8f5acdc3"),
            Err(ValidationError::InvalidCharacter('/'))
        );
    }

    #[test]
    fn parse_digest_rejects_non_hex_alphanumerics() {
        let invalid = "5eb63bbbe01eeed093cb22bb8f5acdcz";
        assert_eq!(
            DigestAlgorithm::Md5.parse_digest(invalid),
            Err(ValidationError::InvalidCharacter('z'))
        );
    }

    #[test]
    fn parse_digest_rejects_non_ascii() {
        let err = DigestAlgorithm::Md5
            .parse_digest("5eb63bbbe01eeed093cb22bb8f5acdcé")
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidCharacter('é'));
    }

    #[test]
    fn parse_digest_rejects_surrounding_whitespace() {
        let padded = format!(" {HELLO_MD5}");
        assert!(DigestAlgorithm::Md5.parse_digest(&padded).is_err());
    }

    #[test]
    fn algorithm_from_str() {
        assert_eq!("md5".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Md5);
        assert_eq!(
            "SHA256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert!(matches!(
            "crc32".parse::<DigestAlgorithm>(),
            Err(ValidationError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn algorithm_display_roundtrips() {
        for alg in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
            assert_eq!(alg.to_string().parse::<DigestAlgorithm>().unwrap(), alg);
        }
    }

    #[test]
    fn algorithm_serde_lowercase() {
        let json = serde_json::to_string(&DigestAlgorithm::Sha256).unwrap();
        assert_eq!(json, "\"sha256\"");
    }

    #[test]
    fn hex_len_matches_output() {
        for alg in [DigestAlgorithm::Md5, DigestAlgorithm::Sha256] {
            assert_eq!(digest_bytes(alg, b"x").as_str().len(), alg.hex_len());
        }
    }

    #[test]
    fn hasher_debug_names_algorithm() {
        let h = DigestAlgorithm::Sha256.hasher();
        assert!(format!("{h:?}").contains("Sha256"));
    }
}
