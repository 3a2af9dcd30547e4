//! Hashing and the Merkle accumulator

pub mod hash;
pub mod merkle;

pub use hash::{hash, Digest, TaggedHasher, DIGEST_LEN};
pub use merkle::{build_proof, build_root, leaf_hash, root_from_leaf_hashes, verify, MERKLE_ALG};
