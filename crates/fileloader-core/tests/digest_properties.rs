//! # Digest and Layout Properties
//!
//! Property tests over arbitrary inputs: every computed digest parses back
//! to itself, sharding always uses the first two characters, and no string
//! containing a path separator or dot survives validation.

use std::path::Path;

use fileloader_core::{digest_bytes, DigestAlgorithm, ShardLayout};
use proptest::prelude::*;

fn algorithm() -> impl Strategy<Value = DigestAlgorithm> {
    prop_oneof![Just(DigestAlgorithm::Md5), Just(DigestAlgorithm::Sha256)]
}

proptest! {
    #[test]
    fn computed_digest_parses_back(alg in algorithm(), data in proptest::collection::vec(any::<u8>(), 1..512)) {
        let d = digest_bytes(alg, &data);
        let parsed = alg.parse_digest(d.as_str()).unwrap();
        prop_assert_eq!(parsed, d);
    }

    #[test]
    fn uppercase_digest_normalizes(alg in algorithm(), data in proptest::collection::vec(any::<u8>(), 1..64)) {
        let d = digest_bytes(alg, &data);
        let upper = d.as_str().to_ascii_uppercase();
        prop_assert_eq!(alg.parse_digest(&upper).unwrap(), d);
    }

    #[test]
    fn shard_dir_is_first_two_chars(alg in algorithm(), data in proptest::collection::vec(any::<u8>(), 1..64)) {
        let d = digest_bytes(alg, &data);
        let loc = ShardLayout::new("/root").resolve(&d);
        let shard_name = loc.shard_dir.file_name().unwrap().to_str().unwrap();
        prop_assert_eq!(shard_name, &d.as_str()[..2]);
        prop_assert_eq!(loc.path.parent(), Some(loc.shard_dir.as_path()));
        prop_assert_eq!(loc.shard_dir.parent(), Some(Path::new("/root")));
    }

    #[test]
    fn separators_never_validate(prefix in "[0-9a-f]{0,30}", sep in prop_oneof![Just('/'), Just('.'), Just('\\'), Just('%')]) {
        let mut candidate = prefix.clone();
        candidate.push(sep);
        while candidate.len() < 32 {
            candidate.push('a');
        }
        prop_assert!(DigestAlgorithm::Md5.parse_digest(&candidate).is_err());
    }

    #[test]
    fn wrong_length_hex_rejected(hex in "[0-9a-f]{1,80}") {
        prop_assume!(hex.len() != 32);
        prop_assert!(DigestAlgorithm::Md5.parse_digest(&hex).is_err());
    }
}
