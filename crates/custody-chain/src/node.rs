//! Chain nodes: one hop's metadata plus the root of its claim set
//!
//! Wire form: `{ "ver": 1, "iat": <unix secs>, "iss": {"pk": b64, "cn": str},
//! "data": {"alg": "sha256-merkle", "root": b64} }`. Field order is fixed by
//! the struct layout, which is what makes the canonical encoding stable.

use custody_core::encoding::base64_bytes;
use custody_core::{CustodyError, Digest, Result, MERKLE_ALG};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Node format version this crate produces and accepts
pub const NODE_VERSION: u32 = 1;

/// Who appended a node
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerIdentity {
    /// Raw public key; the root issuer's verifying key, empty for keyless relays
    #[serde(with = "base64_bytes")]
    pub pk: Vec<u8>,
    /// Human-readable name, e.g. a SPIFFE ID
    pub cn: String,
}

impl IssuerIdentity {
    /// Identity with a name and no key
    pub fn named(cn: impl Into<String>) -> Self {
        Self {
            pk: Vec::new(),
            cn: cn.into(),
        }
    }

    /// Identity with a name and a public key
    pub fn with_public_key(cn: impl Into<String>, pk: Vec<u8>) -> Self {
        Self { pk, cn: cn.into() }
    }
}

impl fmt::Debug for IssuerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerIdentity")
            .field("pk", &hex::encode(&self.pk))
            .field("cn", &self.cn)
            .finish()
    }
}

/// Algorithm tag and root standing in for a node's claim set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisclosureRoot {
    /// Accumulator algorithm tag
    pub alg: String,
    /// Merkle root over the node's leaves
    pub root: Digest,
}

impl DisclosureRoot {
    /// Descriptor for a root built by this crate's accumulator
    pub fn sha256_merkle(root: Digest) -> Self {
        Self {
            alg: MERKLE_ALG.to_string(),
            root,
        }
    }
}

/// One hop in a delegation chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainNode {
    /// Format version
    pub ver: u32,
    /// Issuance time, unix seconds
    pub iat: i64,
    /// Party that appended this node
    pub iss: IssuerIdentity,
    /// Commitment to the node's claims
    pub data: DisclosureRoot,
}

impl ChainNode {
    /// Current-version node committing to `root`
    pub fn new(iat: i64, iss: IssuerIdentity, root: Digest) -> Self {
        Self {
            ver: NODE_VERSION,
            iat,
            iss,
            data: DisclosureRoot::sha256_merkle(root),
        }
    }

    /// Merkle root this node commits to
    pub fn root(&self) -> &Digest {
        &self.data.root
    }

    /// Canonical bytes: compact JSON in declaration order
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Reject versions and algorithms this implementation does not speak
    pub fn check_supported(&self, index: usize) -> Result<()> {
        if self.ver != NODE_VERSION {
            return Err(CustodyError::malformed_chain(format!(
                "node {index} has unsupported version {}",
                self.ver
            )));
        }
        if self.data.alg != MERKLE_ALG {
            return Err(CustodyError::malformed_chain(format!(
                "node {index} uses unsupported disclosure algorithm '{}'",
                self.data.alg
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> ChainNode {
        ChainNode::new(
            1_700_000_000,
            IssuerIdentity::with_public_key("spiffe://example.org/AS", vec![1, 2, 3]),
            Digest::new([9; 32]),
        )
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(node()).unwrap();
        assert_eq!(value["ver"], 1);
        assert_eq!(value["iat"], 1_700_000_000i64);
        assert_eq!(value["iss"]["pk"], "AQID");
        assert_eq!(value["iss"]["cn"], "spiffe://example.org/AS");
        assert_eq!(value["data"]["alg"], "sha256-merkle");
        assert_eq!(value["data"]["root"], Digest::new([9; 32]).to_base64());
    }

    #[test]
    fn test_canonical_bytes_are_stable() {
        let bytes = node().canonical_bytes().unwrap();
        let reparsed: ChainNode = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reparsed.canonical_bytes().unwrap(), bytes);
        assert!(bytes.starts_with(br#"{"ver":1,"iat":1700000000,"iss":{"pk":"AQID""#));
    }

    #[test]
    fn test_unsupported_version_and_alg() {
        let mut n = node();
        n.ver = 2;
        assert!(matches!(
            n.check_supported(0),
            Err(CustodyError::MalformedChain { .. })
        ));

        let mut n = node();
        n.data.alg = "blake3-merkle".to_string();
        assert!(n.check_supported(3).unwrap_err().to_string().contains("node 3"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let mut value = serde_json::to_value(node()).unwrap();
        value["extra"] = serde_json::json!(true);
        assert!(serde_json::from_value::<ChainNode>(value).is_err());
    }

    #[test]
    fn test_debug_shows_key_as_hex() {
        let debug = format!("{:?}", node().iss);
        assert!(debug.contains("010203"));
    }
}
