//! SHA-256 hashing for leaf commitments, Merkle nodes and chain bindings
//!
//! Every hash in the protocol goes through this module so the algorithm is
//! declared once. Multi-part inputs use [`TaggedHasher`], which prefixes a
//! domain tag and length-frames variable-sized parts so that two different
//! part sequences can never produce the same preimage.
//!
//! Current algorithm: **SHA-256** (32-byte output)

use crate::encoding;
use crate::{CustodyError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Length in bytes of every digest produced here
pub const DIGEST_LEN: usize = 32;

/// Hash arbitrary bytes with SHA-256
pub fn hash(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// A 32-byte SHA-256 digest
///
/// Serialized as standard base64 on the wire and printed as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Wrap raw digest bytes
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Hash `data` into a digest
    pub fn of(data: &[u8]) -> Self {
        Self(hash(data))
    }

    /// Build from a slice, which must be exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| {
            CustodyError::serialization(format!(
                "digest must be {DIGEST_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Standard base64, the wire encoding
    pub fn to_base64(&self) -> String {
        encoding::encode_b64(&self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = encoding::decode_b64(&text).map_err(serde::de::Error::custom)?;
        Digest::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher with a domain tag and length-framed parts
pub struct TaggedHasher(Sha256);

impl TaggedHasher {
    /// Start a hash in the domain named by `tag`
    pub fn new(tag: &[u8]) -> Self {
        let mut inner = Sha256::new();
        inner.update(tag);
        Self(inner)
    }

    /// Append fixed-width bytes as-is
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.0.update(data);
        self
    }

    /// Append variable-width bytes prefixed by their big-endian u64 length
    pub fn update_framed(&mut self, data: &[u8]) -> &mut Self {
        self.0.update((data.len() as u64).to_be_bytes());
        self.0.update(data);
        self
    }

    /// Finish and return the digest
    pub fn finalize(self) -> Digest {
        Digest(self.0.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hex::encode(hash(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_serde_is_base64() {
        let digest = Digest::new([0xAB; DIGEST_LEN]);
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_base64()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn test_digest_rejects_wrong_length() {
        assert!(Digest::from_slice(&[1u8; 31]).is_err());
        let short = format!("\"{}\"", encoding::encode_b64(&[1u8; 16]));
        assert!(serde_json::from_str::<Digest>(&short).is_err());
    }

    #[test]
    fn test_framing_separates_part_boundaries() {
        let mut a = TaggedHasher::new(b"t");
        a.update_framed(b"ab").update_framed(b"c");
        let mut b = TaggedHasher::new(b"t");
        b.update_framed(b"a").update_framed(b"bc");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_tags_separate_domains() {
        let mut a = TaggedHasher::new(b"one");
        a.update(b"x");
        let mut b = TaggedHasher::new(b"two");
        b.update(b"x");
        assert_ne!(a.finalize(), b.finalize());
    }
}
