//! Selective disclosures over a node's leaves
//!
//! A disclosure lists every leaf position of a node in order. Each position
//! is either [`LeafSlot::Revealed`] (the leaf bytes, from which the claim is
//! decoded) or [`LeafSlot::Committed`] (only the leaf hash). The builder
//! hashes unrevealed leaves at construction, so an unrevealed claim value is
//! never present in a disclosure or its serialized form.
//!
//! Wire form: `{ "leaves": [ {"revealed": b64} | {"committed": b64} ], "revealed": [int] }`.
//! The `revealed` list must name exactly the revealed slots; deserialization
//! rejects a disclosure where the two disagree.

use crate::claims::{decode_leaf, CanonicalClaims, ClaimSet};
use crate::crypto::hash::Digest;
use crate::crypto::merkle;
use crate::encoding::{base64_bytes, parse_bounded};
use crate::{CustodyError, Result};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeSet;

/// One leaf position in a disclosure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafSlot {
    /// Plaintext leaf bytes the recipient may read
    Revealed(#[serde(with = "base64_bytes")] Vec<u8>),
    /// Commitment standing in for a leaf the recipient may not read
    Committed(Digest),
}

impl LeafSlot {
    /// Commitment to this slot's leaf
    pub fn leaf_hash(&self) -> Digest {
        match self {
            LeafSlot::Revealed(leaf) => merkle::leaf_hash(leaf),
            LeafSlot::Committed(hash) => *hash,
        }
    }

    /// Whether the plaintext is present
    pub fn is_revealed(&self) -> bool {
        matches!(self, LeafSlot::Revealed(_))
    }
}

/// Selective disclosure of a node's claim set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DisclosureWire", into = "DisclosureWire")]
pub struct Disclosure {
    slots: Vec<LeafSlot>,
    revealed: Vec<usize>,
}

#[derive(Serialize, Deserialize)]
struct DisclosureWire {
    leaves: Vec<LeafSlot>,
    revealed: Vec<usize>,
}

/// Wire form with both arrays left unparsed until their length is checked
#[derive(Deserialize)]
struct DisclosureEnvelope<'a> {
    #[serde(borrow)]
    leaves: &'a RawValue,
    #[serde(borrow)]
    revealed: &'a RawValue,
}

impl TryFrom<DisclosureWire> for Disclosure {
    type Error = CustodyError;

    fn try_from(wire: DisclosureWire) -> Result<Self> {
        if wire.leaves.is_empty() {
            return Err(CustodyError::empty_leaf_set("disclosure carries no leaves"));
        }
        let declared: BTreeSet<usize> = wire.revealed.iter().copied().collect();
        if declared.len() != wire.revealed.len() {
            return Err(CustodyError::serialization(
                "disclosure lists a revealed index twice",
            ));
        }
        let tagged: BTreeSet<usize> = wire
            .leaves
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_revealed())
            .map(|(i, _)| i)
            .collect();
        if declared != tagged {
            return Err(CustodyError::serialization(
                "disclosure revealed indices disagree with its leaf slots",
            ));
        }
        Ok(Self {
            slots: wire.leaves,
            revealed: tagged.into_iter().collect(),
        })
    }
}

impl From<Disclosure> for DisclosureWire {
    fn from(disclosure: Disclosure) -> Self {
        Self {
            leaves: disclosure.slots,
            revealed: disclosure.revealed,
        }
    }
}

impl Disclosure {
    /// Reveal `revealed` out of `leaves`, committing to every other leaf
    pub fn build(leaves: &[Vec<u8>], revealed: &[usize]) -> Result<Self> {
        if leaves.is_empty() {
            return Err(CustodyError::empty_leaf_set(
                "cannot disclose over zero leaves",
            ));
        }
        let mut reveal_set = BTreeSet::new();
        for &index in revealed {
            if index >= leaves.len() {
                return Err(CustodyError::RevealedIndexOutOfRange {
                    index,
                    len: leaves.len(),
                });
            }
            reveal_set.insert(index);
        }

        let slots = leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| {
                if reveal_set.contains(&i) {
                    LeafSlot::Revealed(leaf.clone())
                } else {
                    LeafSlot::Committed(merkle::leaf_hash(leaf))
                }
            })
            .collect();

        Ok(Self {
            slots,
            revealed: reveal_set.into_iter().collect(),
        })
    }

    /// Reveal every leaf; what an issuer keeps for itself
    pub fn full(leaves: &[Vec<u8>]) -> Result<Self> {
        let all: Vec<usize> = (0..leaves.len()).collect();
        Self::build(leaves, &all)
    }

    /// Reveal only the claim called `key`
    pub fn for_key(canonical: &CanonicalClaims, key: &str) -> Result<Self> {
        let index = canonical
            .index_of(key)
            .ok_or_else(|| CustodyError::encoding(format!("claim '{key}' is not in the key order")))?;
        Self::build(&canonical.leaves, &[index])
    }

    /// Narrow this disclosure to `indices`, all of which must already be revealed
    ///
    /// Lets a holder of a full disclosure hand a downstream party a smaller one
    /// without access to the original leaves.
    pub fn restrict(&self, indices: &[usize]) -> Result<Self> {
        let mut keep = BTreeSet::new();
        for &index in indices {
            match self.slots.get(index) {
                None => {
                    return Err(CustodyError::RevealedIndexOutOfRange {
                        index,
                        len: self.slots.len(),
                    })
                }
                Some(LeafSlot::Committed(_)) => {
                    return Err(CustodyError::encoding(format!(
                        "leaf {index} is committed in this disclosure and cannot be revealed"
                    )))
                }
                Some(LeafSlot::Revealed(_)) => {
                    keep.insert(index);
                }
            }
        }

        let slots = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                LeafSlot::Revealed(leaf) if !keep.contains(&i) => {
                    LeafSlot::Committed(merkle::leaf_hash(leaf))
                }
                other => other.clone(),
            })
            .collect();

        Ok(Self {
            slots,
            revealed: keep.into_iter().collect(),
        })
    }

    /// Number of leaf positions
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false for a constructed disclosure; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Sorted indices whose plaintext is present
    pub fn revealed_indices(&self) -> &[usize] {
        &self.revealed
    }

    /// Leaf positions in order
    pub fn slots(&self) -> &[LeafSlot] {
        &self.slots
    }

    /// Plaintext leaf at `index`, if revealed
    pub fn revealed_leaf(&self, index: usize) -> Option<&[u8]> {
        match self.slots.get(index) {
            Some(LeafSlot::Revealed(leaf)) => Some(leaf),
            _ => None,
        }
    }

    /// Commitment for every position, revealed or not
    pub fn leaf_hashes(&self) -> Vec<Digest> {
        self.slots.iter().map(LeafSlot::leaf_hash).collect()
    }

    /// Root this disclosure reconstructs
    pub fn root(&self) -> Result<Digest> {
        merkle::root_from_leaf_hashes(&self.leaf_hashes())
    }

    /// Whether this disclosure reconstructs `expected_root`
    pub fn verify(&self, expected_root: &Digest) -> bool {
        merkle::verify(self, expected_root)
    }

    /// Decode the revealed leaves into claims, in leaf order
    pub fn revealed_claims(&self) -> Result<ClaimSet> {
        let mut claims = ClaimSet::new();
        for &index in &self.revealed {
            let Some(leaf) = self.revealed_leaf(index) else {
                continue;
            };
            let claim = decode_leaf(leaf)?;
            if claims.get(&claim.name).is_some() {
                return Err(CustodyError::encoding(format!(
                    "claim '{}' is revealed more than once",
                    claim.name
                )));
            }
            claims.insert(claim.name, claim.value);
        }
        Ok(claims)
    }

    /// Serialize to JSON bytes
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Parse from JSON bytes, refusing more than `max_leaves` leaf positions
    /// before any leaf beyond the limit is decoded
    pub fn from_json_bounded(bytes: &[u8], max_leaves: usize) -> Result<Self> {
        let envelope: DisclosureEnvelope<'_> = serde_json::from_slice(bytes)?;
        let wire = DisclosureWire {
            leaves: parse_bounded(envelope.leaves, max_leaves, "leaves")?,
            revealed: parse_bounded(envelope.revealed, max_leaves, "revealed indices")?,
        };
        Self::try_from(wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{Canonicalizer, ClaimValue, SEED_LEN};

    fn canonical() -> CanonicalClaims {
        let claims = ClaimSet::from_permissions(&["repo.read", "repo.write", "pr.open"]);
        Canonicalizer::with_seed([3; SEED_LEN])
            .canonicalize(&claims)
            .unwrap()
    }

    #[test]
    fn test_build_rejects_bad_input() {
        assert!(matches!(
            Disclosure::build(&[], &[]),
            Err(CustodyError::EmptyLeafSet { .. })
        ));
        let leaves = canonical().leaves;
        assert_eq!(
            Disclosure::build(&leaves, &[3]).unwrap_err(),
            CustodyError::RevealedIndexOutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn test_partial_disclosure_reveals_only_selected() {
        let canonical = canonical();
        let disclosure = Disclosure::for_key(&canonical, "repo.write").unwrap();
        assert_eq!(disclosure.revealed_indices(), &[1]);
        assert!(disclosure.revealed_leaf(0).is_none());
        assert!(disclosure.revealed_leaf(1).is_some());

        let claims = disclosure.revealed_claims().unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims.get("repo.write"), Some(&ClaimValue::Bool(true)));

        let root = merkle::build_root(&canonical.leaves).unwrap();
        assert!(disclosure.verify(&root));
    }

    #[test]
    fn test_serialized_form_hides_unrevealed_leaves() {
        let canonical = canonical();
        let disclosure = Disclosure::build(&canonical.leaves, &[1]).unwrap();
        let json = String::from_utf8(disclosure.to_json().unwrap()).unwrap();
        assert!(!json.contains("repo.read"));
        assert!(!json.contains("pr.open"));
        for hidden in [0, 2] {
            let encoded = crate::encoding::encode_b64(&canonical.leaves[hidden]);
            assert!(!json.contains(&encoded));
        }
    }

    #[test]
    fn test_wire_roundtrip_and_shape() {
        let disclosure = Disclosure::build(&canonical().leaves, &[2, 0]).unwrap();
        let value: serde_json::Value = serde_json::to_value(&disclosure).unwrap();
        assert_eq!(value["revealed"], serde_json::json!([0, 2]));
        assert!(value["leaves"][0].get("revealed").is_some());
        assert!(value["leaves"][1].get("committed").is_some());

        let back = Disclosure::from_json(&disclosure.to_json().unwrap()).unwrap();
        assert_eq!(back, disclosure);
    }

    #[test]
    fn test_wire_rejects_inconsistent_revealed_list() {
        let disclosure = Disclosure::build(&canonical().leaves, &[1]).unwrap();
        let mut value = serde_json::to_value(&disclosure).unwrap();
        value["revealed"] = serde_json::json!([0]);
        assert!(serde_json::from_value::<Disclosure>(value.clone()).is_err());
        value["revealed"] = serde_json::json!([1, 1]);
        assert!(serde_json::from_value::<Disclosure>(value).is_err());
    }

    #[test]
    fn test_bounded_parse_caps_leaf_count() {
        let disclosure = Disclosure::build(&canonical().leaves, &[1]).unwrap();
        let bytes = disclosure.to_json().unwrap();
        assert_eq!(Disclosure::from_json_bounded(&bytes, 3).unwrap(), disclosure);

        let err = Disclosure::from_json_bounded(&bytes, 2).unwrap_err();
        assert!(err.to_string().contains("more than 2 leaves"));

        let mut value = serde_json::to_value(&disclosure).unwrap();
        value["revealed"] = serde_json::json!([0, 1, 2]);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(Disclosure::from_json_bounded(&bytes, 2).is_err());
        // Within the limit, consistency checks still apply
        assert!(Disclosure::from_json_bounded(&bytes, 3).is_err());
    }

    #[test]
    fn test_restrict_narrows_full_disclosure() {
        let canonical = canonical();
        let root = merkle::build_root(&canonical.leaves).unwrap();
        let full = Disclosure::full(&canonical.leaves).unwrap();
        let narrow = full.restrict(&[2]).unwrap();
        assert_eq!(narrow.revealed_indices(), &[2]);
        assert!(narrow.verify(&root));
        assert_eq!(narrow, Disclosure::build(&canonical.leaves, &[2]).unwrap());

        // A committed slot cannot be re-revealed
        assert!(narrow.restrict(&[1]).is_err());
        assert!(narrow.restrict(&[9]).is_err());
    }

    #[test]
    fn test_zero_revealed_still_verifies() {
        let canonical = canonical();
        let root = merkle::build_root(&canonical.leaves).unwrap();
        let private = Disclosure::build(&canonical.leaves, &[]).unwrap();
        assert!(private.verify(&root));
        assert!(private.revealed_claims().unwrap().is_empty());
    }

    #[test]
    fn test_for_key_unknown_claim() {
        assert!(matches!(
            Disclosure::for_key(&canonical(), "admin"),
            Err(CustodyError::Encoding { .. })
        ));
    }
}
