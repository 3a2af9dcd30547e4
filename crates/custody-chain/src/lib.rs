//! Custody Chain - delegation chains built from selectively disclosable nodes
//!
//! A chain starts with a root node signed by the issuing authority. Each
//! relay appends a node committing to its own claims and binds it to the
//! exact bytes of the chain it received. Verifiers check the root
//! signature, every binding, and whatever per-node disclosures they were
//! handed, learning only the claims those disclosures reveal.
//!
//! ```text
//! IssuingAuthority --issue_root--> chain[0]
//!        Relay     --validate--> --extend--> chain[0..=1]
//!  FinalVerifier   --validate--> revealed claims --policy--> allow / deny
//! ```
//!
//! The engine is stateless; chains are immutable byte values and extension
//! always returns a new one.

#![forbid(unsafe_code)]

/// Delegation chain structure and wire format
pub mod chain;

/// Issue, extend and validate
pub mod engine;

/// Issuing authority, relay and final verifier roles
pub mod hops;

/// Messages exchanged between hops
pub mod messages;

/// Chain nodes
pub mod node;

/// Root signing capability
pub mod signer;

/// Issuance clock
pub mod time;

/// Disclosure maps and validation reports
pub mod validation;

pub use chain::DelegationChain;
pub use engine::{ChainEngine, ChainSummary, IssuedNode};
pub use hops::{require_true, FinalVerifier, Forward, IssuingAuthority, Relay, POLICY_DENIED};
pub use messages::{
    ExtensionRequest, ExtensionResponse, IssuanceRequest, IssuanceResponse, ValidationRequest,
    ValidationResponse,
};
pub use node::{ChainNode, IssuerIdentity};
pub use signer::{ChainSigner, Ed25519Signer, Ed25519Verifier, SignatureVerifier};
pub use time::{Clock, FixedClock, SystemClock};
pub use validation::{DisclosureMap, ValidationReport};
