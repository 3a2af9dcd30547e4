//! Wire messages exchanged between hops
//!
//! Chains travel as JSON strings inside these envelopes so a message can be
//! logged or forwarded without re-encoding the chain bytes.

use crate::engine::IssuedNode;
use crate::validation::{DisclosureMap, ValidationReport};
use custody_core::encoding::base64_list;
use custody_core::{CustodyError, Disclosure, Result};
use serde::{Deserialize, Serialize};

/// Permissions a caller asks the issuing authority to grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRequest {
    /// Permission names; each becomes a `name -> true` claim
    pub permissions: Vec<String>,
}

/// A freshly issued one-node chain and the material to disclose from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceResponse {
    /// Serialized chain
    pub chain: String,
    /// Claim names in leaf order
    #[serde(rename = "keyOrder")]
    pub key_order: Vec<String>,
    /// Canonical leaves of the root node
    #[serde(with = "base64_list")]
    pub leaves: Vec<Vec<u8>>,
}

impl IssuanceResponse {
    /// Disclosure revealing only `key` from the root node
    pub fn disclose(&self, key: &str) -> Result<Disclosure> {
        let index = self
            .key_order
            .iter()
            .position(|name| name == key)
            .ok_or_else(|| CustodyError::encoding(format!("no claim named '{key}' was issued")))?;
        Disclosure::build(&self.leaves, &[index])
    }
}

impl TryFrom<IssuedNode> for IssuanceResponse {
    type Error = CustodyError;

    fn try_from(issued: IssuedNode) -> Result<Self> {
        Ok(Self {
            chain: chain_string(issued.chain)?,
            key_order: issued.key_order,
            leaves: issued.leaves,
        })
    }
}

/// A chain handed to a relay, with disclosures for its existing nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    /// Serialized chain
    pub chain: String,
    /// Disclosures in node order (`disclosures[i]` opens node `i`)
    pub disclosures: Vec<Disclosure>,
}

/// What a relay returns upstream after forwarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionResponse {
    /// Chain with the relay's node appended
    pub extended_chain: String,
    /// Disclosure of the relay's own node
    pub new_node_disclosure: Disclosure,
    /// Opaque reply from the next hop
    #[serde(default)]
    pub downstream_response: serde_json::Value,
}

/// A chain presented for validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Serialized chain
    pub chain: String,
    /// Disclosures keyed by node index
    pub disclosures: DisclosureMap,
}

/// Authorization outcome returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    /// Whether the request is authorized
    pub authorized: bool,
    /// Operator code for the failure, never claim contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ValidationResponse {
    /// Authorized response
    pub fn allow() -> Self {
        Self {
            authorized: true,
            error_code: None,
        }
    }

    /// Refusal carrying `code`
    pub fn deny(code: impl Into<String>) -> Self {
        Self {
            authorized: false,
            error_code: Some(code.into()),
        }
    }
}

impl From<&ValidationReport> for ValidationResponse {
    fn from(report: &ValidationReport) -> Self {
        match report.error_code() {
            Some(code) => Self::deny(code),
            None if report.ok => Self::allow(),
            None => Self::deny(CustodyError::MALFORMED_CHAIN_CODE),
        }
    }
}

/// Chain bytes as the string carried in messages
pub fn chain_string(chain: Vec<u8>) -> Result<String> {
    String::from_utf8(chain)
        .map_err(|_| CustodyError::serialization("chain bytes are not valid UTF-8"))
}
