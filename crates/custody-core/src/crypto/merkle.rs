//! Merkle accumulator over a node's ordered claim leaves
//!
//! Tree rules (fixed protocol parameters):
//! - leaf hash: `H(0x00 || leaf)`
//! - interior node: `H(0x01 || left || right)`
//! - a level with an odd number of nodes duplicates its last node before
//!   pairing
//! - root: `H(0x02 || u64be(leaf_count) || top)`
//!
//! Binding the leaf count into the root means `[a, b, c]` and `[a, b, c, c]`,
//! which share a top under duplicate padding, still have distinct roots.

use super::hash::{Digest, TaggedHasher};
use crate::disclosure::Disclosure;
use crate::{CustodyError, Result};
use tracing::trace;

/// Algorithm tag recorded in chain nodes for this accumulator
pub const MERKLE_ALG: &str = "sha256-merkle";

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;
const ROOT_TAG: u8 = 0x02;

/// Commitment to a single leaf
pub fn leaf_hash(leaf: &[u8]) -> Digest {
    let mut hasher = TaggedHasher::new(&[LEAF_TAG]);
    hasher.update(leaf);
    hasher.finalize()
}

fn node_hash(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = TaggedHasher::new(&[NODE_TAG]);
    hasher.update(left.as_bytes()).update(right.as_bytes());
    hasher.finalize()
}

/// Fold leaf commitments into the root
///
/// Shared by the builder (which hashes plaintext leaves first) and the
/// verifier (which mixes revealed leaves with carried commitments).
pub fn root_from_leaf_hashes(hashes: &[Digest]) -> Result<Digest> {
    if hashes.is_empty() {
        return Err(CustodyError::empty_leaf_set("cannot build a root over zero leaves"));
    }

    let mut level = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            // Duplicate-last padding
            let last = level[level.len() - 1];
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| node_hash(&pair[0], &pair[1]))
            .collect();
    }

    let mut hasher = TaggedHasher::new(&[ROOT_TAG]);
    hasher
        .update(&(hashes.len() as u64).to_be_bytes())
        .update(level[0].as_bytes());
    Ok(hasher.finalize())
}

/// Build the root digest over plaintext leaves
pub fn build_root(leaves: &[Vec<u8>]) -> Result<Digest> {
    let hashes: Vec<Digest> = leaves.iter().map(|leaf| leaf_hash(leaf)).collect();
    root_from_leaf_hashes(&hashes)
}

/// Build a disclosure revealing `revealed` and committing to the rest
pub fn build_proof(leaves: &[Vec<u8>], revealed: &[usize]) -> Result<Disclosure> {
    Disclosure::build(leaves, revealed)
}

/// Recompute the root carried by `disclosure` and compare it with `expected_root`
///
/// Returns `false` rather than an error for any non-matching disclosure.
pub fn verify(disclosure: &Disclosure, expected_root: &Digest) -> bool {
    match root_from_leaf_hashes(&disclosure.leaf_hashes()) {
        Ok(root) if &root == expected_root => true,
        Ok(root) => {
            trace!(expected = %expected_root, actual = %root, "disclosure root mismatch");
            false
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("leaf-{i}").into_bytes()).collect()
    }

    #[test]
    fn test_empty_leaf_set_rejected() {
        assert!(matches!(
            build_root(&[]),
            Err(CustodyError::EmptyLeafSet { .. })
        ));
    }

    #[test]
    fn test_single_leaf_root() {
        let set = leaves(1);
        let mut hasher = TaggedHasher::new(&[ROOT_TAG]);
        hasher
            .update(&1u64.to_be_bytes())
            .update(leaf_hash(&set[0]).as_bytes());
        assert_eq!(build_root(&set).unwrap(), hasher.finalize());
    }

    #[test]
    fn test_odd_level_duplicates_last_leaf() {
        let set = leaves(3);
        let h: Vec<Digest> = set.iter().map(|l| leaf_hash(l)).collect();
        let top = node_hash(&node_hash(&h[0], &h[1]), &node_hash(&h[2], &h[2]));
        let mut hasher = TaggedHasher::new(&[ROOT_TAG]);
        hasher.update(&3u64.to_be_bytes()).update(top.as_bytes());
        assert_eq!(build_root(&set).unwrap(), hasher.finalize());
    }

    #[test]
    fn test_padding_duplicate_does_not_collide() {
        let three = leaves(3);
        let mut four = three.clone();
        four.push(three[2].clone());
        assert_ne!(build_root(&three).unwrap(), build_root(&four).unwrap());
    }

    #[test]
    fn test_order_matters() {
        let set = leaves(4);
        let mut swapped = set.clone();
        swapped.swap(0, 1);
        assert_ne!(build_root(&set).unwrap(), build_root(&swapped).unwrap());
    }

    #[test]
    fn test_proof_verifies_for_every_size() {
        for n in 1..=9 {
            let set = leaves(n);
            let root = build_root(&set).unwrap();
            let proof = build_proof(&set, &[n - 1]).unwrap();
            assert!(verify(&proof, &root), "size {n}");
        }
    }

    #[test]
    fn test_verify_false_for_other_root() {
        let set = leaves(5);
        let other = build_root(&leaves(6)).unwrap();
        let proof = build_proof(&set, &[0, 2]).unwrap();
        assert!(!verify(&proof, &other));
    }
}
