//! Claims and the claim-set canonicalizer
//!
//! A node commits to an insertion-ordered claim set. Each claim becomes one
//! leaf: the compact JSON array `[salt, name, value]`, where `salt` is 16
//! bytes of unpadded base64url. Leaf order is the claim insertion order and
//! is part of the wire format: disclosures address leaves by that index.
//!
//! Salts come from a 32-byte seed, so canonicalizing the same claim set with
//! the same seed is deterministic. A fresh random seed per claim set keeps
//! commitments to low-entropy values such as `true` from being brute forced.

use crate::crypto::hash::TaggedHasher;
use crate::encoding;
use crate::{CustodyError, Result};
use indexmap::IndexMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes of salt mixed into every leaf
pub const SALT_LEN: usize = 16;

/// Length of the seed salts are derived from
pub const SEED_LEN: usize = 32;

const SALT_TAG: &[u8] = b"custody/salt/v1";

/// Value of a single claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// Boolean grant such as `repo.write: true`
    Bool(bool),
    /// Numeric value (integer or finite float)
    Number(serde_json::Number),
    /// String value
    String(String),
}

impl ClaimValue {
    /// The boolean value, if this is a boolean claim
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ClaimValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short type name, safe to put in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            ClaimValue::Bool(_) => "bool",
            ClaimValue::Number(_) => "number",
            ClaimValue::String(_) => "string",
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimValue::Bool(b) => write!(f, "{b}"),
            ClaimValue::Number(n) => write!(f, "{n}"),
            ClaimValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Bool(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Number(value.into())
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::String(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::String(value)
    }
}

impl TryFrom<serde_json::Value> for ClaimValue {
    type Error = CustodyError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(ClaimValue::Bool(b)),
            serde_json::Value::Number(n) => Ok(ClaimValue::Number(n)),
            serde_json::Value::String(s) => Ok(ClaimValue::String(s)),
            serde_json::Value::Null => Err(CustodyError::encoding("null is not a claim value")),
            serde_json::Value::Array(_) => {
                Err(CustodyError::encoding("arrays are not claim values"))
            }
            serde_json::Value::Object(_) => {
                Err(CustodyError::encoding("objects are not claim values"))
            }
        }
    }
}

/// A named claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Claim name, unique within a node
    pub name: String,
    /// Claim value
    pub value: ClaimValue,
}

/// Insertion-ordered claims for one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(IndexMap<String, ClaimValue>);

impl ClaimSet {
    /// Empty claim set
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim set granting every listed permission (`name -> true`)
    ///
    /// This is how an issuing authority turns a permission request into the
    /// root node's claims. Repeated permissions collapse to one claim.
    pub fn from_permissions<S: AsRef<str>>(permissions: &[S]) -> Self {
        permissions
            .iter()
            .map(|p| (p.as_ref().to_string(), ClaimValue::Bool(true)))
            .collect()
    }

    /// Claim set from a JSON object, rejecting unsupported value types
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(CustodyError::encoding("claims must be a JSON object"));
        };
        let mut claims = ClaimSet::new();
        for (name, value) in map {
            let value = ClaimValue::try_from(value).map_err(|e| match e {
                CustodyError::Encoding { message } => {
                    CustodyError::encoding(format!("claim '{name}': {message}"))
                }
                other => other,
            })?;
            claims.insert(name, value);
        }
        Ok(claims)
    }

    /// Insert or replace a claim; a replaced claim keeps its position
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ClaimValue>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Look up a claim value
    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    /// Number of claims
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no claims
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Claim names in canonical order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Claims in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClaimValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, ClaimValue)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (String, ClaimValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Output of canonicalization: the key order and the matching leaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalClaims {
    /// Claim names; `key_order[i]` names `leaves[i]`
    pub key_order: Vec<String>,
    /// Canonical leaf bytes
    pub leaves: Vec<Vec<u8>>,
}

impl CanonicalClaims {
    /// Leaf index of a claim name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.key_order.iter().position(|k| k == name)
    }
}

/// Turns claim sets into ordered, salted leaves
#[derive(Clone)]
pub struct Canonicalizer {
    seed: [u8; SEED_LEN],
}

impl Canonicalizer {
    /// Canonicalizer with a fresh seed from the OS RNG
    pub fn random() -> Self {
        let mut seed = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut seed);
        Self { seed }
    }

    /// Canonicalizer with a caller-chosen seed (deterministic output)
    pub fn with_seed(seed: [u8; SEED_LEN]) -> Self {
        Self { seed }
    }

    /// Canonicalize `claims` into key order and leaves
    pub fn canonicalize(&self, claims: &ClaimSet) -> Result<CanonicalClaims> {
        let mut key_order = Vec::with_capacity(claims.len());
        let mut leaves = Vec::with_capacity(claims.len());
        for (index, (name, value)) in claims.iter().enumerate() {
            if name.is_empty() {
                return Err(CustodyError::encoding(format!(
                    "claim at position {index} has an empty name"
                )));
            }
            let salt = self.salt(index, name);
            leaves.push(encode_leaf(&salt, name, value)?);
            key_order.push(name.to_string());
        }
        Ok(CanonicalClaims { key_order, leaves })
    }

    fn salt(&self, index: usize, name: &str) -> [u8; SALT_LEN] {
        let mut hasher = TaggedHasher::new(SALT_TAG);
        hasher
            .update(&self.seed)
            .update(&(index as u32).to_be_bytes())
            .update_framed(name.as_bytes());
        let digest = hasher.finalize();
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&digest.as_bytes()[..SALT_LEN]);
        salt
    }
}

impl fmt::Debug for Canonicalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canonicalizer")
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

/// Encode one claim as leaf bytes
pub fn encode_leaf(salt: &[u8; SALT_LEN], name: &str, value: &ClaimValue) -> Result<Vec<u8>> {
    let salt = encoding::encode_b64url(salt);
    serde_json::to_vec(&(salt, name, value))
        .map_err(|_| CustodyError::encoding(format!("claim '{name}' could not be serialized")))
}

/// Decode leaf bytes back into the claim they carry
pub fn decode_leaf(leaf: &[u8]) -> Result<Claim> {
    // Parse errors are replaced wholesale so leaf contents never reach a message
    let (salt, name, value): (String, String, serde_json::Value) = serde_json::from_slice(leaf)
        .map_err(|_| CustodyError::encoding("leaf is not a canonical claim encoding"))?;
    let salt = encoding::decode_b64url(&salt)
        .map_err(|_| CustodyError::encoding(format!("claim '{name}' has an unreadable salt")))?;
    if salt.len() != SALT_LEN {
        return Err(CustodyError::encoding(format!(
            "claim '{name}' salt must be {SALT_LEN} bytes"
        )));
    }
    let value = ClaimValue::try_from(value)
        .map_err(|_| CustodyError::encoding(format!("claim '{name}' has an unsupported value")))?;
    Ok(Claim { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo_claims() -> ClaimSet {
        ClaimSet::from_permissions(&["repo.read", "repo.write", "pr.open"])
    }

    #[test]
    fn test_insertion_order_is_canonical() {
        let canonical = Canonicalizer::with_seed([7; SEED_LEN])
            .canonicalize(&repo_claims())
            .unwrap();
        assert_eq!(canonical.key_order, vec!["repo.read", "repo.write", "pr.open"]);
        assert_eq!(canonical.index_of("repo.write"), Some(1));
        assert_eq!(canonical.index_of("missing"), None);
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let a = Canonicalizer::with_seed([1; SEED_LEN]).canonicalize(&repo_claims()).unwrap();
        let b = Canonicalizer::with_seed([1; SEED_LEN]).canonicalize(&repo_claims()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_seeds_change_leaves_not_keys() {
        let a = Canonicalizer::with_seed([1; SEED_LEN]).canonicalize(&repo_claims()).unwrap();
        let b = Canonicalizer::with_seed([2; SEED_LEN]).canonicalize(&repo_claims()).unwrap();
        assert_eq!(a.key_order, b.key_order);
        assert_ne!(a.leaves, b.leaves);
    }

    #[test]
    fn test_leaf_roundtrip() {
        let canonical = Canonicalizer::random().canonicalize(&repo_claims()).unwrap();
        let claim = decode_leaf(&canonical.leaves[2]).unwrap();
        assert_eq!(claim.name, "pr.open");
        assert_eq!(claim.value, ClaimValue::Bool(true));
    }

    #[test]
    fn test_leaf_shape() {
        let leaf = encode_leaf(&[0; SALT_LEN], "execute", &ClaimValue::Bool(true)).unwrap();
        assert_eq!(
            String::from_utf8(leaf).unwrap(),
            r#"["AAAAAAAAAAAAAAAAAAAAAA","execute",true]"#
        );
    }

    #[test]
    fn test_from_json_rejects_unsupported_types() {
        let err = ClaimSet::from_json(json!({"ok": true, "bad": null})).unwrap_err();
        assert!(matches!(err, CustodyError::Encoding { .. }));
        assert!(err.to_string().contains("'bad'"));

        assert!(ClaimSet::from_json(json!({"nested": {"a": 1}})).is_err());
        assert!(ClaimSet::from_json(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_from_json_accepts_scalars() {
        let claims =
            ClaimSet::from_json(json!({"service": "server1", "allow": true, "quota": 3})).unwrap();
        assert_eq!(claims.len(), 3);
        assert_eq!(claims.get("quota"), Some(&ClaimValue::from(3i64)));
        assert_eq!(claims.get("allow").and_then(ClaimValue::as_bool), Some(true));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut claims = ClaimSet::new();
        claims.insert("", true);
        assert!(matches!(
            Canonicalizer::random().canonicalize(&claims),
            Err(CustodyError::Encoding { .. })
        ));
    }

    #[test]
    fn test_decode_errors_do_not_echo_leaf() {
        let err = decode_leaf(br#"["salt","secret-name",null]"#).unwrap_err();
        assert!(!err.to_string().contains("null"));
        let err = decode_leaf(b"top-secret-value").unwrap_err();
        assert!(!err.to_string().contains("top-secret-value"));
    }

    #[test]
    fn test_replacing_claim_keeps_position() {
        let mut claims = repo_claims();
        claims.insert("repo.read", false);
        assert_eq!(claims.names().next(), Some("repo.read"));
        assert_eq!(claims.get("repo.read"), Some(&ClaimValue::Bool(false)));
    }
}
