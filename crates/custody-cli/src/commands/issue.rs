//! Issue a root chain as the authorization server

use super::{keygen::load_signer, load_claims, write_json, NodeBundle};
use anyhow::Result;
use clap::Args;
use custody_chain::{ChainEngine, IssuerIdentity};
use custody_core::ChainConfig;
use std::path::PathBuf;
use tracing::info;

/// Arguments for root issuance
#[derive(Args, Debug)]
pub struct IssueArgs {
    /// Hex secret key file from `custody keygen`
    #[arg(short, long)]
    pub key: PathBuf,

    /// Issuer name recorded in the root node
    #[arg(short, long, default_value = "spiffe://example.org/AS")]
    pub issuer: String,

    /// JSON object of claims
    #[arg(long)]
    pub claims: Option<PathBuf>,

    /// Permission granted as `name -> true` (repeatable)
    #[arg(short, long = "permission")]
    pub permissions: Vec<String>,

    /// Output bundle: chain, key order and leaves
    #[arg(short, long, default_value = "issued.json")]
    pub out: PathBuf,
}

/// Issue and write the node bundle
pub fn run(args: &IssueArgs, config: ChainConfig) -> Result<()> {
    let signer = load_signer(&args.key)?;
    let claims = load_claims(args.claims.as_deref(), &args.permissions)?;
    let engine = ChainEngine::new(config)?;

    let issued = engine.issue_root(&claims, IssuerIdentity::named(args.issuer.as_str()), &signer)?;
    let bundle = NodeBundle::try_from(issued)?;
    write_json(&args.out, &bundle)?;

    info!(path = %args.out.display(), claims = bundle.key_order.len(), "wrote issued chain");
    Ok(())
}
