// Command modules for CLI

use anyhow::{Context, Result};
use custody_chain::messages::chain_string;
use custody_chain::{DisclosureMap, IssuedNode};
use custody_core::encoding::base64_list;
use custody_core::{ClaimSet, Disclosure};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Full four-party delegation run in-process
pub mod demo;

/// Selective disclosure from an issued or extended node
pub mod disclose;

/// Relay extension of an existing chain
pub mod extend;

/// Root chain issuance
pub mod issue;

/// Signing key generation
pub mod keygen;

/// Chain and disclosure validation
pub mod validate;

/// On-disk record of one node: the chain ending at it and the leaves a
/// holder discloses from
///
/// Written by `issue` for the root and by `extend` for each relay node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBundle {
    /// Serialized chain whose last node this bundle describes
    pub chain: String,
    /// Claim names in leaf order
    #[serde(rename = "keyOrder")]
    pub key_order: Vec<String>,
    /// Canonical leaves of the last node
    #[serde(with = "base64_list")]
    pub leaves: Vec<Vec<u8>>,
}

impl NodeBundle {
    /// Disclosure revealing `names` and committing to every other leaf
    pub fn disclose(&self, names: &[String]) -> Result<Disclosure> {
        let indices = names
            .iter()
            .map(|name| {
                self.key_order
                    .iter()
                    .position(|key| key == name)
                    .with_context(|| format!("bundle has no claim named '{name}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Disclosure::build(&self.leaves, &indices)?)
    }
}

impl TryFrom<IssuedNode> for NodeBundle {
    type Error = anyhow::Error;

    fn try_from(issued: IssuedNode) -> Result<Self> {
        Ok(Self {
            chain: chain_string(issued.chain)?,
            key_order: issued.key_order,
            leaves: issued.leaves,
        })
    }
}

/// Read and parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Read `NODE=FILE` disclosures into a map, rejecting repeated nodes
///
/// Each file is refused once it lists more than `max_leaves` leaves.
pub fn load_disclosures(args: &[(usize, PathBuf)], max_leaves: usize) -> Result<DisclosureMap> {
    let mut map = DisclosureMap::new();
    for (node, path) in args {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let disclosure = Disclosure::from_json_bounded(&bytes, max_leaves)
            .with_context(|| format!("invalid disclosure in {}", path.display()))?;
        map.insert(*node, disclosure)?;
    }
    Ok(map)
}

/// Write `value` as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// Claims from a JSON object file plus repeated `--permission` flags
///
/// Permissions are appended after file claims as `name -> true`.
pub fn load_claims(file: Option<&Path>, permissions: &[String]) -> Result<ClaimSet> {
    let mut claims = match file {
        Some(path) => ClaimSet::from_json(read_json(path)?)
            .with_context(|| format!("unsupported claims in {}", path.display()))?,
        None => ClaimSet::new(),
    };
    for permission in permissions {
        claims.insert(permission.as_str(), true);
    }
    if claims.is_empty() {
        anyhow::bail!("no claims given; pass --claims FILE or --permission NAME");
    }
    Ok(claims)
}

/// Parse a `NODE=FILE` disclosure argument
pub fn parse_disclosure_arg(arg: &str) -> std::result::Result<(usize, PathBuf), String> {
    let (node, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NODE=FILE, got '{arg}'"))?;
    let node = node
        .trim()
        .parse()
        .map_err(|_| format!("node index in '{arg}' is not a number"))?;
    if path.is_empty() {
        return Err(format!("no file given in '{arg}'"));
    }
    Ok((node, PathBuf::from(path)))
}
