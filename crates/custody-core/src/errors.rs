//! Unified error system for custody tokens
//!
//! One error type covers claim encoding, disclosure construction and chain
//! validation. Messages name node indices, claim names and counts but never
//! claim values, so errors can be logged or returned to a peer without
//! leaking partially disclosed secrets.

use serde::{Deserialize, Serialize};

/// Unified error type for all custody operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum CustodyError {
    /// A claim value or name cannot be encoded into a leaf
    #[error("Encoding error: {message}")]
    Encoding {
        /// What could not be encoded
        message: String,
    },

    /// A claim set or leaf sequence was empty where at least one leaf is required
    #[error("Empty leaf set: {message}")]
    EmptyLeafSet {
        /// Where the empty set was encountered
        message: String,
    },

    /// A disclosure asked to reveal an index that has no leaf
    #[error("Revealed index {index} is out of range for {len} leaves")]
    RevealedIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of leaves available
        len: usize,
    },

    /// Chain bytes are structurally invalid
    #[error("Malformed chain: {message}")]
    MalformedChain {
        /// Parse or structure failure
        message: String,
    },

    /// A chain could not be extended
    #[error("Chain extension failed: {message}")]
    ChainExtension {
        /// Why the extension was refused
        message: String,
    },

    /// The root node signature does not verify against the declared issuer key
    #[error("Root signature invalid: {message}")]
    Signature {
        /// Verification failure detail
        message: String,
    },

    /// A binding value does not match the prefix it claims to extend
    #[error("Chain binding mismatch at node {node}")]
    ChainTamper {
        /// First node whose binding failed
        node: usize,
    },

    /// A supplied disclosure does not reconstruct its node's root
    #[error("Disclosure for node {node} rejected: {reason}")]
    DisclosureMismatch {
        /// Node the disclosure was supplied for
        node: usize,
        /// Structural reason (never includes claim values)
        reason: String,
    },

    /// More than one disclosure was supplied for the same node
    #[error("Duplicate disclosure for node {node}")]
    DuplicateDisclosure {
        /// Node index that appeared twice
        node: usize,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Configuration problem
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },
}

impl CustodyError {
    /// Code of [`CustodyError::MalformedChain`]
    pub const MALFORMED_CHAIN_CODE: &str = "CHAIN/MALFORMED";

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create an empty leaf set error
    pub fn empty_leaf_set(message: impl Into<String>) -> Self {
        Self::EmptyLeafSet {
            message: message.into(),
        }
    }

    /// Create a malformed chain error
    pub fn malformed_chain(message: impl Into<String>) -> Self {
        Self::MalformedChain {
            message: message.into(),
        }
    }

    /// Create a chain extension error
    pub fn chain_extension(message: impl Into<String>) -> Self {
        Self::ChainExtension {
            message: message.into(),
        }
    }

    /// Create a signature error
    pub fn signature(message: impl Into<String>) -> Self {
        Self::Signature {
            message: message.into(),
        }
    }

    /// Create a disclosure mismatch error for `node`
    pub fn disclosure_mismatch(node: usize, reason: impl Into<String>) -> Self {
        Self::DisclosureMismatch {
            node,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Stable code reported to operators alongside a uniform "not authorized"
    pub fn code(&self) -> &'static str {
        match self {
            Self::Encoding { .. } => "SD/ENCODING",
            Self::EmptyLeafSet { .. } => "SD/EMPTY",
            Self::RevealedIndexOutOfRange { .. } => "SD/INDEX",
            Self::MalformedChain { .. } => Self::MALFORMED_CHAIN_CODE,
            Self::ChainExtension { .. } => "CHAIN/EXTEND",
            Self::Signature { .. } => "CHAIN/SIGNATURE",
            Self::ChainTamper { .. } => "CHAIN/TAMPER",
            Self::DisclosureMismatch { .. } => "SD/MISMATCH",
            Self::DuplicateDisclosure { .. } => "SD/DUPLICATE",
            Self::Config { .. } => "CONFIG",
            Self::Serialization { .. } => "SERIALIZE",
        }
    }

    /// Signature and binding failures indicate forgery or tampering, not caller bugs
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::Signature { .. } | Self::ChainTamper { .. })
    }
}

/// Standard Result type for custody operations
pub type Result<T> = std::result::Result<T, CustodyError>;

impl From<serde_json::Error> for CustodyError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
