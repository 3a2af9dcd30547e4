//! Validate a chain and its disclosures as the final verifier

use super::{load_disclosures, parse_disclosure_arg, read_json, NodeBundle};
use anyhow::{bail, Result};
use clap::Args;
use custody_chain::hops::parse_requirements;
use custody_chain::{
    require_true, ChainEngine, ValidationReport, ValidationResponse, POLICY_DENIED,
};
use custody_core::ChainConfig;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for validation
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Node bundle holding the chain to validate
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Disclosure as NODE=FILE (repeatable)
    #[arg(short, long = "disclosure", value_parser = parse_disclosure_arg)]
    pub disclosures: Vec<(usize, PathBuf)>,

    /// Claim that must be revealed as true, as NODE:CLAIM (repeatable)
    #[arg(long = "require")]
    pub requirements: Vec<String>,
}

/// Validate, apply requirements and print the decision
pub fn run(args: &ValidateArgs, config: ChainConfig) -> Result<()> {
    let bundle: NodeBundle = read_json(&args.bundle)?;
    let disclosures = load_disclosures(&args.disclosures, config.max_claims_per_node)?;
    let requirements = parse_requirements(args.requirements.as_slice())?;
    let engine = ChainEngine::new(config)?;

    let report = engine.validate(bundle.chain.as_bytes(), &disclosures);
    let response = if !report.ok {
        ValidationResponse::from(&report)
    } else if require_true(requirements)(&report.revealed) {
        ValidationResponse::allow()
    } else {
        ValidationResponse::deny(POLICY_DENIED)
    };

    let output = decision_json(&report, &response);
    println!("{}", serde_json::to_string_pretty(&output)?);

    match response.error_code {
        None => {
            info!(nodes = report.nodes, "chain authorized");
            Ok(())
        }
        Some(code) => {
            warn!(%code, "chain not authorized");
            bail!("validation failed: {code}")
        }
    }
}

/// Printed decision; revealed claims appear only on an authorized chain
pub fn decision_json(report: &ValidationReport, response: &ValidationResponse) -> Value {
    let mut output = json!({
        "authorized": response.authorized,
        "error_code": response.error_code,
        "nodes": report.nodes,
    });
    if response.authorized && response.error_code.is_none() {
        output["revealed"] = json!(report.revealed);
    }
    output
}
