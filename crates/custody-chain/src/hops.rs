//! The three roles a chain passes through
//!
//! An [`IssuingAuthority`] turns a permission request into a signed root
//! chain. A [`Relay`] validates what it was shown, appends its own node and
//! prepares the request for the next hop. A [`FinalVerifier`] validates the
//! whole chain and applies a caller policy to the revealed claims.
//!
//! Transport is left to the caller: each role consumes and produces the
//! message types in [`crate::messages`].

use crate::engine::ChainEngine;
use crate::messages::{
    chain_string, ExtensionRequest, ExtensionResponse, IssuanceRequest, IssuanceResponse,
    ValidationRequest, ValidationResponse,
};
use crate::node::IssuerIdentity;
use crate::signer::{ChainSigner, Ed25519Verifier, SignatureVerifier};
use crate::time::{Clock, SystemClock};
use crate::validation::DisclosureMap;
use custody_core::{ClaimSet, ClaimValue, CustodyError, Disclosure, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Error code reported when validation passed but the policy refused
pub const POLICY_DENIED: &str = "POLICY/DENIED";

/// Revealed claims keyed by node index
pub type RevealedClaims = BTreeMap<usize, ClaimSet>;

/// Issues root chains for permission requests
pub struct IssuingAuthority<S, V = Ed25519Verifier, C = SystemClock> {
    engine: ChainEngine<V, C>,
    signer: S,
    name: String,
}

impl<S: ChainSigner, V: SignatureVerifier, C: Clock> IssuingAuthority<S, V, C> {
    /// Authority named `name` signing with `signer`
    pub fn new(engine: ChainEngine<V, C>, signer: S, name: impl Into<String>) -> Self {
        Self {
            engine,
            signer,
            name: name.into(),
        }
    }

    /// Grant every requested permission as a `true` claim in a new root chain
    pub fn issue(&self, request: &IssuanceRequest) -> Result<IssuanceResponse> {
        let claims = ClaimSet::from_permissions(request.permissions.as_slice());
        let issued = self.engine.issue_root(
            &claims,
            IssuerIdentity::named(self.name.as_str()),
            &self.signer,
        )?;
        IssuanceResponse::try_from(issued)
    }
}

/// Outcome of a relay hop: what to send downstream and what to keep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    /// Request for the next hop, carrying the extended chain
    pub downstream: ValidationRequest,
    /// Disclosure of the relay's own node
    pub new_node_disclosure: Disclosure,
}

impl Forward {
    /// Upstream response once the next hop has answered
    pub fn into_response(self, downstream_response: serde_json::Value) -> ExtensionResponse {
        ExtensionResponse {
            extended_chain: self.downstream.chain,
            new_node_disclosure: self.new_node_disclosure,
            downstream_response,
        }
    }
}

/// Intermediate hop that checks the chain it receives and extends it
pub struct Relay<V = Ed25519Verifier, C = SystemClock> {
    engine: ChainEngine<V, C>,
    name: String,
    claims: ClaimSet,
}

impl<V: SignatureVerifier, C: Clock> Relay<V, C> {
    /// Relay named `name` that appends `claims`
    pub fn new(engine: ChainEngine<V, C>, name: impl Into<String>, claims: ClaimSet) -> Self {
        Self {
            engine,
            name: name.into(),
            claims,
        }
    }

    /// Validate the inbound chain, append this relay's node and build the
    /// downstream request
    ///
    /// Inbound disclosures are forwarded unchanged; the relay's own node is
    /// fully disclosed.
    pub fn handle(&self, request: &ExtensionRequest) -> Result<Forward> {
        let inbound = DisclosureMap::from_ordered(request.disclosures.clone());
        let report = self.engine.validate(request.chain.as_bytes(), &inbound);
        if let Some(err) = report.error {
            warn!(relay = %self.name, code = err.code(), "inbound chain rejected");
            return Err(err);
        }

        let extended = self.engine.extend(
            request.chain.as_bytes(),
            &self.claims,
            IssuerIdentity::named(self.name.as_str()),
        )?;
        let node = report.nodes;
        let mut disclosures = inbound;
        disclosures.insert(node, extended.disclosure.clone())?;

        info!(relay = %self.name, node, "forwarding extended chain");
        Ok(Forward {
            downstream: ValidationRequest {
                chain: chain_string(extended.chain)?,
                disclosures,
            },
            new_node_disclosure: extended.disclosure,
        })
    }
}

/// Last hop: validates the chain and decides authorization
pub struct FinalVerifier<P, V = Ed25519Verifier, C = SystemClock> {
    engine: ChainEngine<V, C>,
    policy: P,
}

impl<P, V, C> FinalVerifier<P, V, C>
where
    P: Fn(&RevealedClaims) -> bool,
    V: SignatureVerifier,
    C: Clock,
{
    /// Verifier applying `policy` to the revealed claims of valid chains
    pub fn new(engine: ChainEngine<V, C>, policy: P) -> Self {
        Self { engine, policy }
    }

    /// Validate and authorize
    pub fn handle(&self, request: &ValidationRequest) -> ValidationResponse {
        let report = self.engine.validate(request.chain.as_bytes(), &request.disclosures);
        if !report.ok {
            return ValidationResponse::from(&report);
        }
        if (self.policy)(&report.revealed) {
            info!(nodes = report.nodes, "request authorized");
            ValidationResponse::allow()
        } else {
            warn!(nodes = report.nodes, "policy refused revealed claims");
            ValidationResponse::deny(POLICY_DENIED)
        }
    }
}

/// Policy requiring each `(node, claim)` to be revealed with value `true`
pub fn require_true(
    required: Vec<(usize, String)>,
) -> impl Fn(&RevealedClaims) -> bool + Send + Sync {
    move |revealed: &RevealedClaims| {
        required.iter().all(|(node, claim)| {
            revealed
                .get(node)
                .and_then(|claims| claims.get(claim))
                .and_then(ClaimValue::as_bool)
                .unwrap_or(false)
        })
    }
}

/// Parse `node:claim` requirement strings
pub fn parse_requirements<S: AsRef<str>>(specs: &[S]) -> Result<Vec<(usize, String)>> {
    specs
        .iter()
        .map(|spec| {
            let spec = spec.as_ref();
            let (node, claim) = spec.split_once(':').ok_or_else(|| {
                CustodyError::config(format!("requirement '{spec}' must look like NODE:CLAIM"))
            })?;
            let node = node.trim().parse::<usize>().map_err(|_| {
                CustodyError::config(format!("requirement '{spec}' has a non-numeric node"))
            })?;
            let claim = claim.trim();
            if claim.is_empty() {
                return Err(CustodyError::config(format!(
                    "requirement '{spec}' names no claim"
                )));
            }
            Ok((node, claim.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use crate::time::FixedClock;
    use custody_core::ChainConfig;

    fn engine() -> ChainEngine<Ed25519Verifier, FixedClock> {
        ChainEngine::with_parts(ChainConfig::default(), Ed25519Verifier, FixedClock(7)).unwrap()
    }

    #[test]
    fn test_requirement_parsing() {
        let parsed = parse_requirements(&["0:repo.write", " 1 : execute "]).unwrap();
        assert_eq!(
            parsed,
            vec![(0, "repo.write".to_string()), (1, "execute".to_string())]
        );
        assert!(parse_requirements(&["repo.write"]).is_err());
        assert!(parse_requirements(&["x:repo.write"]).is_err());
        assert!(parse_requirements(&["0:"]).is_err());
    }

    #[test]
    fn test_require_true_policy() {
        let mut revealed = RevealedClaims::new();
        let mut claims = ClaimSet::new();
        claims.insert("repo.write", true).insert("mode", "ro");
        revealed.insert(0, claims);

        assert!(require_true(vec![(0, "repo.write".into())])(&revealed));
        assert!(!require_true(vec![(0, "mode".into())])(&revealed));
        assert!(!require_true(vec![(1, "repo.write".into())])(&revealed));
    }

    #[test]
    fn test_issuing_authority_rejects_empty_request() {
        let authority = IssuingAuthority::new(engine(), Ed25519Signer::generate(), "as");
        let result = authority.issue(&IssuanceRequest {
            permissions: Vec::new(),
        });
        assert!(matches!(result, Err(CustodyError::EmptyLeafSet { .. })));
    }

    #[test]
    fn test_relay_rejects_chain_without_valid_disclosure() {
        let authority = IssuingAuthority::new(engine(), Ed25519Signer::generate(), "as");
        let issued = authority
            .issue(&IssuanceRequest {
                permissions: vec!["repo.read".into()],
            })
            .unwrap();
        let foreign = Disclosure::full(&[b"[\"AAAAAAAAAAAAAAAAAAAAAA\",\"x\",true]".to_vec()])
            .unwrap();
        let relay = Relay::new(engine(), "relay", ClaimSet::from_permissions(&["execute"]));
        let result = relay.handle(&ExtensionRequest {
            chain: issued.chain,
            disclosures: vec![foreign],
        });
        assert!(matches!(
            result,
            Err(CustodyError::DisclosureMismatch { node: 0, .. })
        ));
    }
}
