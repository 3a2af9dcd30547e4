//! Disclosure maps handed to validation, and the report it returns

use custody_core::{ClaimSet, CustodyError, Disclosure, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Disclosures keyed by the node index they open
///
/// Supplying two disclosures for one node is rejected rather than letting the
/// later one win, both through [`DisclosureMap::insert`] and when a JSON
/// object repeats a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DisclosureMap(BTreeMap<usize, Disclosure>);

impl DisclosureMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(node, disclosure)` pairs, rejecting repeated nodes
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, Disclosure)>,
    {
        let mut map = Self::new();
        for (node, disclosure) in pairs {
            map.insert(node, disclosure)?;
        }
        Ok(map)
    }

    /// Build from disclosures listed in node order (`disclosures[i]` opens node `i`)
    pub fn from_ordered(disclosures: Vec<Disclosure>) -> Self {
        Self(disclosures.into_iter().enumerate().collect())
    }

    /// Add the disclosure for `node`
    pub fn insert(&mut self, node: usize, disclosure: Disclosure) -> Result<()> {
        if self.0.contains_key(&node) {
            return Err(CustodyError::DuplicateDisclosure { node });
        }
        self.0.insert(node, disclosure);
        Ok(())
    }

    /// Disclosure for `node`
    pub fn get(&self, node: usize) -> Option<&Disclosure> {
        self.0.get(&node)
    }

    /// Number of disclosures
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no disclosures are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Disclosures in ascending node order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Disclosure)> {
        self.0.iter().map(|(node, d)| (*node, d))
    }
}

impl<'de> Deserialize<'de> for DisclosureMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = DisclosureMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from node index to disclosure")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = DisclosureMap::new();
                while let Some((node, disclosure)) = access.next_entry::<usize, Disclosure>()? {
                    map.insert(node, disclosure).map_err(serde::de::Error::custom)?;
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// Outcome of validating a chain with a set of disclosures
///
/// On failure `revealed` holds only nodes verified before the failing step
/// and is advisory; callers deciding authorization must look at `ok`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// True only if parsing, signature, bindings and every disclosure passed
    pub ok: bool,
    /// First error encountered
    pub error: Option<CustodyError>,
    /// Revealed claims keyed by node index
    pub revealed: BTreeMap<usize, ClaimSet>,
    /// Nodes in the parsed chain (0 if parsing failed)
    pub nodes: usize,
}

impl ValidationReport {
    pub(crate) fn passed(nodes: usize, revealed: BTreeMap<usize, ClaimSet>) -> Self {
        Self {
            ok: true,
            error: None,
            revealed,
            nodes,
        }
    }

    pub(crate) fn failed(
        nodes: usize,
        error: CustodyError,
        revealed: BTreeMap<usize, ClaimSet>,
    ) -> Self {
        Self {
            ok: false,
            error: Some(error),
            revealed,
            nodes,
        }
    }

    /// Operator-facing error code, if validation failed
    pub fn error_code(&self) -> Option<&'static str> {
        self.error.as_ref().map(CustodyError::code)
    }

    /// Revealed claims on success, the first error otherwise
    pub fn into_result(self) -> Result<BTreeMap<usize, ClaimSet>> {
        match self.error {
            None if self.ok => Ok(self.revealed),
            Some(err) => Err(err),
            None => Err(CustodyError::malformed_chain("validation did not complete")),
        }
    }
}
