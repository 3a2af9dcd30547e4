//! The delegation chain: a signed root node followed by hash-bound links
//!
//! Wire form (compact JSON, fields in this order):
//!
//! ```text
//! { "v": 1,
//!   "root":  { "node": <node 0>, "sig": b64 },
//!   "links": [ { "node": <node i>, "bind": b64 }, ... ] }
//! ```
//!
//! Node 0 is signed over `"custody/root/v1" || canonical(node 0)`. Link `i`
//! carries
//!
//! ```text
//! bind_i = SHA-256("custody/bind/v1" || u64be(|P|) || P || u64be(|N|) || N)
//! ```
//!
//! where `P` is the canonical encoding of the chain holding nodes `0..i`
//! (root signature included) and `N` the canonical encoding of node `i`.
//! Inserting, removing, reordering or editing any node changes some `P` or
//! `N` and breaks the binding from that point on. Dropping trailing links
//! leaves a valid shorter chain; the hash chain is unkeyed.

use crate::node::ChainNode;
use crate::signer::SignatureVerifier;
use custody_core::crypto::TaggedHasher;
use custody_core::encoding::{base64_bytes, parse_bounded};
use custody_core::{ChainConfig, CustodyError, Digest, Result};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Chain format version
pub const CHAIN_VERSION: u32 = 1;

/// Domain tag for the root signature message
pub const ROOT_SIGNATURE_TAG: &[u8] = b"custody/root/v1";

/// Domain tag for link bindings
pub const BINDING_TAG: &[u8] = b"custody/bind/v1";

/// Node 0 and the issuer's signature over it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RootLink {
    /// The root node
    pub node: ChainNode,
    /// Issuer signature over the root message
    #[serde(with = "base64_bytes")]
    pub sig: Vec<u8>,
}

/// A relay node and its binding to the chain it extended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundLink {
    /// The appended node
    pub node: ChainNode,
    /// Hash over the prior chain bytes and this node
    pub bind: Digest,
}

/// An ordered, tamper-evident sequence of chain nodes
///
/// Only [`DelegationChain::from_bytes`] parses a chain, so the node limit
/// applies while the links are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegationChain {
    v: u32,
    root: RootLink,
    links: Vec<BoundLink>,
}

/// Outer chain object with the links left unparsed
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ChainEnvelope<'a> {
    v: u32,
    root: RootLink,
    #[serde(borrow)]
    links: &'a RawValue,
}

/// Borrowed view that serializes exactly like a chain truncated to a prefix
#[derive(Serialize)]
struct ChainPrefix<'a> {
    v: u32,
    root: &'a RootLink,
    links: &'a [BoundLink],
}

/// Message the root issuer signs
pub fn root_signature_message(node: &ChainNode) -> Result<Vec<u8>> {
    let mut message = ROOT_SIGNATURE_TAG.to_vec();
    message.extend_from_slice(&node.canonical_bytes()?);
    Ok(message)
}

/// Binding value tying `node` to the exact `prior` chain bytes
pub fn binding_value(prior: &[u8], node: &ChainNode) -> Result<Digest> {
    let node_bytes = node.canonical_bytes()?;
    let mut hasher = TaggedHasher::new(BINDING_TAG);
    hasher.update_framed(prior).update_framed(&node_bytes);
    Ok(hasher.finalize())
}

impl DelegationChain {
    /// One-node chain from a signed root
    pub fn from_root(node: ChainNode, sig: Vec<u8>) -> Self {
        Self {
            v: CHAIN_VERSION,
            root: RootLink { node, sig },
            links: Vec::new(),
        }
    }

    /// Parse chain bytes, enforcing format and the node limit
    pub fn from_bytes(bytes: &[u8], config: &ChainConfig) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CustodyError::malformed_chain("empty chain input"));
        }
        let envelope: ChainEnvelope<'_> = serde_json::from_slice(bytes)
            .map_err(|e| CustodyError::malformed_chain(format!("unparsable chain: {e}")))?;

        if envelope.v != CHAIN_VERSION {
            return Err(CustodyError::malformed_chain(format!(
                "unsupported chain version {}",
                envelope.v
            )));
        }
        let max_links = config.max_nodes.saturating_sub(1);
        let links = parse_bounded::<BoundLink>(envelope.links, max_links, "relay links")
            .map_err(|e| {
                CustodyError::malformed_chain(format!(
                    "unparsable chain links (node limit is {}): {e}",
                    config.max_nodes
                ))
            })?;

        let chain = Self {
            v: envelope.v,
            root: envelope.root,
            links,
        };
        for (index, node) in chain.nodes().enumerate() {
            node.check_supported(index)?;
        }
        Ok(chain)
    }

    /// Canonical bytes of the whole chain
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.prefix_bytes(self.len())
    }

    /// Canonical bytes of the chain holding only its first `nodes` nodes
    pub fn prefix_bytes(&self, nodes: usize) -> Result<Vec<u8>> {
        if nodes == 0 || nodes > self.len() {
            return Err(CustodyError::malformed_chain(format!(
                "prefix of {nodes} nodes requested from a chain of {}",
                self.len()
            )));
        }
        let prefix = ChainPrefix {
            v: self.v,
            root: &self.root,
            links: &self.links[..nodes - 1],
        };
        Ok(serde_json::to_vec(&prefix)?)
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        1 + self.links.len()
    }

    /// A chain always has its root node
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Node at `index`
    pub fn node(&self, index: usize) -> Option<&ChainNode> {
        match index {
            0 => Some(&self.root.node),
            i => self.links.get(i - 1).map(|link| &link.node),
        }
    }

    /// Nodes in chain order
    pub fn nodes(&self) -> impl Iterator<Item = &ChainNode> {
        std::iter::once(&self.root.node).chain(self.links.iter().map(|link| &link.node))
    }

    /// The signed root
    pub fn root(&self) -> &RootLink {
        &self.root
    }

    /// Relay links after the root
    pub fn links(&self) -> &[BoundLink] {
        &self.links
    }

    /// New chain with `node` appended and bound to this chain's bytes
    pub fn append(&self, node: ChainNode) -> Result<Self> {
        let prior = self.to_bytes()?;
        let bind = binding_value(&prior, &node)?;
        let mut links = self.links.clone();
        links.push(BoundLink { node, bind });
        Ok(Self {
            v: self.v,
            root: self.root.clone(),
            links,
        })
    }

    /// Check the root signature against the key declared in node 0
    pub fn verify_root_signature(&self, verifier: &dyn SignatureVerifier) -> Result<()> {
        let message = root_signature_message(&self.root.node)?;
        verifier.verify(&self.root.node.iss.pk, &message, &self.root.sig)
    }

    /// Recompute every link binding; the first mismatch fails the whole chain
    pub fn verify_bindings(&self) -> Result<()> {
        for (offset, link) in self.links.iter().enumerate() {
            let index = offset + 1;
            let prior = self.prefix_bytes(index)?;
            let expected = binding_value(&prior, &link.node)?;
            if expected != link.bind {
                return Err(CustodyError::ChainTamper { node: index });
            }
        }
        Ok(())
    }
}
