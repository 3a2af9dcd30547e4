//! Chain engine: issue, extend and validate delegation chains
//!
//! Every operation is a pure function of its arguments plus the engine's
//! immutable configuration, verifier and clock. Chains go in and come out as
//! bytes; extension always produces a new value. The engine holds no mutable
//! state and needs no locking to be shared across threads.

use crate::chain::{root_signature_message, DelegationChain};
use crate::node::{ChainNode, IssuerIdentity};
use crate::signer::{ChainSigner, Ed25519Verifier, SignatureVerifier};
use crate::time::{Clock, SystemClock};
use crate::validation::{DisclosureMap, ValidationReport};
use custody_core::crypto::build_root;
use custody_core::{
    Canonicalizer, ChainConfig, ClaimSet, ConfigValidation, CustodyError, Disclosure, Result,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A freshly appended node: the new chain plus the material to disclose it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedNode {
    /// Serialized chain including the new node
    pub chain: Vec<u8>,
    /// Claim names in leaf order for the new node
    pub key_order: Vec<String>,
    /// Canonical leaves of the new node
    pub leaves: Vec<Vec<u8>>,
    /// Disclosure revealing every claim of the new node
    pub disclosure: Disclosure,
}

impl IssuedNode {
    /// Disclosure revealing only `key` from the new node
    pub fn disclose(&self, key: &str) -> Result<Disclosure> {
        let index = self
            .key_order
            .iter()
            .position(|name| name == key)
            .ok_or_else(|| CustodyError::encoding(format!("no claim named '{key}' in this node")))?;
        Disclosure::build(&self.leaves, &[index])
    }
}

/// Unverified summary of a chain, for logging and inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    /// Node count, root included
    pub nodes: usize,
    /// `cn` of each node in chain order
    pub issuers: Vec<String>,
    /// `iat` of each node in chain order
    pub issued_at: Vec<i64>,
}

/// Builds, extends and validates delegation chains
#[derive(Debug, Clone)]
pub struct ChainEngine<V = Ed25519Verifier, C = SystemClock> {
    config: ChainConfig,
    verifier: V,
    clock: C,
}

impl ChainEngine {
    /// Engine with Ed25519 root signatures and the system clock
    pub fn new(config: ChainConfig) -> Result<Self> {
        Self::with_parts(config, Ed25519Verifier, SystemClock)
    }
}

impl<V: SignatureVerifier, C: Clock> ChainEngine<V, C> {
    /// Engine with a custom verifier and clock
    pub fn with_parts(config: ChainConfig, verifier: V, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            verifier,
            clock,
        })
    }

    /// Limits this engine enforces
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Issue a one-node chain over `claims`, signed by `signer`
    pub fn issue_root(
        &self,
        claims: &ClaimSet,
        issuer: IssuerIdentity,
        signer: &dyn ChainSigner,
    ) -> Result<IssuedNode> {
        self.issue_root_with(claims, issuer, signer, &Canonicalizer::random())
    }

    /// [`ChainEngine::issue_root`] with a caller-supplied canonicalizer
    pub fn issue_root_with(
        &self,
        claims: &ClaimSet,
        mut issuer: IssuerIdentity,
        signer: &dyn ChainSigner,
        canonicalizer: &Canonicalizer,
    ) -> Result<IssuedNode> {
        let public_key = signer.public_key();
        if !issuer.pk.is_empty() && issuer.pk != public_key {
            return Err(CustodyError::signature(
                "issuer public key does not match the signing key",
            ));
        }
        issuer.pk = public_key;

        let (key_order, leaves, root) = self.commit(claims, canonicalizer)?;
        let issuer_name = issuer.cn.clone();
        let node = ChainNode::new(self.clock.now_unix(), issuer, root);
        let sig = signer.sign(&root_signature_message(&node)?)?;
        let chain = DelegationChain::from_root(node, sig);
        let disclosure = Disclosure::full(&leaves)?;

        info!(
            issuer = %issuer_name,
            claims = leaves.len(),
            root = %root,
            "issued root chain"
        );
        Ok(IssuedNode {
            chain: chain.to_bytes()?,
            key_order,
            leaves,
            disclosure,
        })
    }

    /// Append a node over `claims` to `existing`, bound to its exact bytes
    pub fn extend(
        &self,
        existing: &[u8],
        claims: &ClaimSet,
        relay: IssuerIdentity,
    ) -> Result<IssuedNode> {
        self.extend_with(existing, claims, relay, &Canonicalizer::random())
    }

    /// [`ChainEngine::extend`] with a caller-supplied canonicalizer
    pub fn extend_with(
        &self,
        existing: &[u8],
        claims: &ClaimSet,
        relay: IssuerIdentity,
        canonicalizer: &Canonicalizer,
    ) -> Result<IssuedNode> {
        let chain = DelegationChain::from_bytes(existing, &self.config)
            .map_err(|e| CustodyError::chain_extension(e.to_string()))?;
        if chain.len() >= self.config.max_nodes {
            return Err(CustodyError::chain_extension(format!(
                "chain already holds {} nodes, limit is {}",
                chain.len(),
                self.config.max_nodes
            )));
        }

        let (key_order, leaves, root) = self.commit(claims, canonicalizer)?;
        let relay_name = relay.cn.clone();
        let node = ChainNode::new(self.clock.now_unix(), relay, root);
        let extended = chain.append(node)?;
        let disclosure = Disclosure::full(&leaves)?;

        info!(
            relay = %relay_name,
            node = chain.len(),
            claims = leaves.len(),
            "extended chain"
        );
        Ok(IssuedNode {
            chain: extended.to_bytes()?,
            key_order,
            leaves,
            disclosure,
        })
    }

    /// Validate `chain` and the supplied disclosures
    ///
    /// Steps, in order: parse, root signature, every binding (all-or-nothing),
    /// then each disclosure in ascending node order. The report carries the
    /// first error and whatever claims were verified before it.
    pub fn validate(&self, chain: &[u8], disclosures: &DisclosureMap) -> ValidationReport {
        let parsed = match DelegationChain::from_bytes(chain, &self.config) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(code = err.code(), "chain rejected before verification");
                return ValidationReport::failed(0, err, BTreeMap::new());
            }
        };
        let nodes = parsed.len();

        if let Err(err) = parsed
            .verify_root_signature(&self.verifier)
            .and_then(|()| parsed.verify_bindings())
        {
            warn!(code = err.code(), nodes, "chain failed integrity check");
            return ValidationReport::failed(nodes, err, BTreeMap::new());
        }

        let mut revealed = BTreeMap::new();
        for (index, disclosure) in disclosures.iter() {
            match self.open_node(&parsed, index, disclosure) {
                Ok(claims) => {
                    revealed.insert(index, claims);
                }
                Err(err) => {
                    debug!(code = err.code(), node = index, "disclosure rejected");
                    return ValidationReport::failed(nodes, err, revealed);
                }
            }
        }

        debug!(nodes, disclosed = revealed.len(), "chain validated");
        ValidationReport::passed(nodes, revealed)
    }

    /// Parse without verifying, for display
    pub fn inspect(&self, chain: &[u8]) -> Result<ChainSummary> {
        let parsed = DelegationChain::from_bytes(chain, &self.config)?;
        Ok(ChainSummary {
            nodes: parsed.len(),
            issuers: parsed.nodes().map(|n| n.iss.cn.clone()).collect(),
            issued_at: parsed.nodes().map(|n| n.iat).collect(),
        })
    }

    fn commit(
        &self,
        claims: &ClaimSet,
        canonicalizer: &Canonicalizer,
    ) -> Result<(Vec<String>, Vec<Vec<u8>>, custody_core::Digest)> {
        if claims.len() > self.config.max_claims_per_node {
            return Err(CustodyError::encoding(format!(
                "{} claims exceed the per-node limit of {}",
                claims.len(),
                self.config.max_claims_per_node
            )));
        }
        let canonical = canonicalizer.canonicalize(claims)?;
        let root = build_root(&canonical.leaves)?;
        Ok((canonical.key_order, canonical.leaves, root))
    }

    fn open_node(
        &self,
        chain: &DelegationChain,
        index: usize,
        disclosure: &Disclosure,
    ) -> Result<ClaimSet> {
        let node = chain.node(index).ok_or_else(|| {
            CustodyError::disclosure_mismatch(
                index,
                format!("chain has only {} nodes", chain.len()),
            )
        })?;
        if disclosure.len() > self.config.max_claims_per_node {
            return Err(CustodyError::disclosure_mismatch(
                index,
                "disclosure exceeds the per-node leaf limit",
            ));
        }
        if !disclosure.verify(node.root()) {
            return Err(CustodyError::disclosure_mismatch(
                index,
                "leaves do not reconstruct the node root",
            ));
        }
        disclosure.revealed_claims().map_err(|_| {
            CustodyError::disclosure_mismatch(index, "revealed leaves do not decode as claims")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use crate::time::FixedClock;
    use custody_core::ClaimValue;

    fn engine() -> ChainEngine<Ed25519Verifier, FixedClock> {
        ChainEngine::with_parts(ChainConfig::default(), Ed25519Verifier, FixedClock(1_000)).unwrap()
    }

    fn issue(engine: &ChainEngine<Ed25519Verifier, FixedClock>) -> IssuedNode {
        let claims = ClaimSet::from_permissions(&["repo.read", "repo.write"]);
        engine
            .issue_root(
                &claims,
                IssuerIdentity::named("spiffe://example.org/AS"),
                &Ed25519Signer::generate(),
            )
            .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChainConfig {
            max_nodes: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(
            ChainEngine::new(config),
            Err(CustodyError::Config { .. })
        ));
    }

    #[test]
    fn test_issue_records_signer_key_and_clock() {
        let engine = engine();
        let issued = issue(&engine);
        let chain = DelegationChain::from_bytes(&issued.chain, engine.config()).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.root().node.iat, 1_000);
        assert_eq!(chain.root().node.iss.pk.len(), 32);
        assert_eq!(issued.key_order, vec!["repo.read", "repo.write"]);
        assert_eq!(issued.disclosure.revealed_indices(), &[0, 1]);
    }

    #[test]
    fn test_issue_rejects_mismatched_declared_key() {
        let result = engine().issue_root(
            &ClaimSet::from_permissions(&["a"]),
            IssuerIdentity::with_public_key("as", vec![0; 32]),
            &Ed25519Signer::generate(),
        );
        assert!(matches!(result, Err(CustodyError::Signature { .. })));
    }

    #[test]
    fn test_issue_rejects_empty_claims() {
        let result = engine().issue_root(
            &ClaimSet::new(),
            IssuerIdentity::named("as"),
            &Ed25519Signer::generate(),
        );
        assert!(matches!(result, Err(CustodyError::EmptyLeafSet { .. })));
    }

    #[test]
    fn test_extend_rejects_garbage() {
        let result = engine().extend(
            b"{not a chain",
            &ClaimSet::from_permissions(&["execute"]),
            IssuerIdentity::named("relay"),
        );
        assert!(matches!(result, Err(CustodyError::ChainExtension { .. })));
    }

    #[test]
    fn test_extend_respects_node_limit() {
        let engine = ChainEngine::with_parts(
            ChainConfig {
                max_nodes: 2,
                ..ChainConfig::default()
            },
            Ed25519Verifier,
            FixedClock(1),
        )
        .unwrap();
        let issued = issue(&engine);
        let claims = ClaimSet::from_permissions(&["execute"]);
        let one = engine
            .extend(&issued.chain, &claims, IssuerIdentity::named("r1"))
            .unwrap();
        assert!(matches!(
            engine.extend(&one.chain, &claims, IssuerIdentity::named("r2")),
            Err(CustodyError::ChainExtension { .. })
        ));
    }

    #[test]
    fn test_claim_limit_enforced() {
        let engine = ChainEngine::with_parts(
            ChainConfig {
                max_claims_per_node: 1,
                ..ChainConfig::default()
            },
            Ed25519Verifier,
            FixedClock(1),
        )
        .unwrap();
        let result = engine.issue_root(
            &ClaimSet::from_permissions(&["a", "b"]),
            IssuerIdentity::named("as"),
            &Ed25519Signer::generate(),
        );
        assert!(matches!(result, Err(CustodyError::Encoding { .. })));
    }

    #[test]
    fn test_validate_without_disclosures() {
        let engine = engine();
        let issued = issue(&engine);
        let report = engine.validate(&issued.chain, &DisclosureMap::new());
        assert!(report.ok);
        assert_eq!(report.nodes, 1);
        assert!(report.revealed.is_empty());
    }

    #[test]
    fn test_validate_disclosure_for_missing_node() {
        let engine = engine();
        let issued = issue(&engine);
        let disclosures = DisclosureMap::from_pairs(vec![
            (0, issued.disclosure.clone()),
            (4, issued.disclosure.clone()),
        ])
        .unwrap();
        let report = engine.validate(&issued.chain, &disclosures);
        assert!(!report.ok);
        assert!(matches!(
            report.error,
            Some(CustodyError::DisclosureMismatch { node: 4, .. })
        ));
        // Node 0 verified before the failure
        assert_eq!(
            report.revealed[&0].get("repo.write"),
            Some(&ClaimValue::Bool(true))
        );
    }

    #[test]
    fn test_inspect_lists_issuers() {
        let engine = engine();
        let issued = issue(&engine);
        let extended = engine
            .extend(
                &issued.chain,
                &ClaimSet::from_permissions(&["execute"]),
                IssuerIdentity::named("spiffe://example.org/server1"),
            )
            .unwrap();
        let summary = engine.inspect(&extended.chain).unwrap();
        assert_eq!(summary.nodes, 2);
        assert_eq!(
            summary.issuers,
            vec!["spiffe://example.org/AS", "spiffe://example.org/server1"]
        );
        assert_eq!(summary.issued_at, vec![1_000, 1_000]);
    }
}
