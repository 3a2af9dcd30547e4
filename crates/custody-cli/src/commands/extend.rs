//! Extend a chain as a relay

use super::{
    load_claims, load_disclosures, parse_disclosure_arg, read_json, write_json, NodeBundle,
};
use anyhow::{bail, Result};
use clap::Args;
use custody_chain::{ChainEngine, IssuerIdentity};
use custody_core::ChainConfig;
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for relay extension
#[derive(Args, Debug)]
pub struct ExtendArgs {
    /// Inbound node bundle (its chain is extended)
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Disclosure checked before extending, as NODE=FILE (repeatable)
    #[arg(short, long = "disclosure", value_parser = parse_disclosure_arg)]
    pub disclosures: Vec<(usize, PathBuf)>,

    /// Relay name recorded in the new node
    #[arg(short, long, default_value = "spiffe://example.org/server1")]
    pub relay: String,

    /// JSON object of claims for the new node
    #[arg(long)]
    pub claims: Option<PathBuf>,

    /// Claim set to `true` in the new node (repeatable)
    #[arg(short, long = "permission")]
    pub permissions: Vec<String>,

    /// Output bundle for the extended chain
    #[arg(short, long, default_value = "extended.json")]
    pub out: PathBuf,
}

/// Validate the inbound chain, append the relay node and write the bundle
pub fn run(args: &ExtendArgs, config: ChainConfig) -> Result<()> {
    let inbound: NodeBundle = read_json(&args.bundle)?;
    let claims = load_claims(args.claims.as_deref(), &args.permissions)?;
    let disclosures = load_disclosures(&args.disclosures, config.max_claims_per_node)?;
    let engine = ChainEngine::new(config)?;

    let report = engine.validate(inbound.chain.as_bytes(), &disclosures);
    if let Some(err) = report.error {
        warn!(code = err.code(), "refusing to extend an invalid chain");
        bail!(err);
    }

    let extended = engine.extend(
        inbound.chain.as_bytes(),
        &claims,
        IssuerIdentity::named(args.relay.as_str()),
    )?;
    let bundle = NodeBundle::try_from(extended)?;
    write_json(&args.out, &bundle)?;

    info!(path = %args.out.display(), nodes = report.nodes + 1, "wrote extended chain");
    Ok(())
}
