//! Custody Core - claims, Merkle accumulator and selective disclosure
//!
//! This crate holds the per-node half of the custody token protocol: how a
//! claim set becomes ordered leaves, how leaves become a Merkle root, and how
//! a holder proves a subset of claims against that root without revealing
//! the rest. Chain structure and signatures live in `custody-chain`.
//!
//! # Data flow
//!
//! ```text
//! ClaimSet --Canonicalizer--> leaves --build_root--> Digest (stored in a node)
//!                               \--Disclosure::build--> Disclosure --verify(root)--> bool
//! ```

#![forbid(unsafe_code)]

/// Claim sets and the canonicalizer
pub mod claims;

/// Protocol limits and configuration validation
pub mod config;

/// Hashing and the Merkle accumulator
pub mod crypto;

/// Selective disclosures
pub mod disclosure;

/// Base64 helpers and serde adapters
pub mod encoding;

/// Unified error handling
pub mod errors;

pub use claims::{Canonicalizer, CanonicalClaims, Claim, ClaimSet, ClaimValue};
pub use config::{ChainConfig, ConfigValidation, ConfigValidator};
pub use crypto::{Digest, MERKLE_ALG};
pub use disclosure::{Disclosure, LeafSlot};
pub use errors::{CustodyError, Result};
