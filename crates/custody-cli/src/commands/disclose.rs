//! Build a selective disclosure from a node bundle

use super::{read_json, write_json, NodeBundle};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Arguments for disclosure
#[derive(Args, Debug)]
pub struct DiscloseArgs {
    /// Node bundle written by `issue` or `extend`
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Claim name to reveal (repeatable); none reveals nothing
    #[arg(short, long = "reveal")]
    pub reveal: Vec<String>,

    /// Output disclosure file
    #[arg(short, long, default_value = "disclosure.json")]
    pub out: PathBuf,
}

/// Reveal the named claims and commit to the rest
pub fn run(args: &DiscloseArgs) -> Result<()> {
    let bundle: NodeBundle = read_json(&args.bundle)?;
    let disclosure = bundle.disclose(&args.reveal)?;
    write_json(&args.out, &disclosure)?;
    info!(
        path = %args.out.display(),
        revealed = disclosure.revealed_indices().len(),
        leaves = disclosure.len(),
        "wrote disclosure"
    );
    Ok(())
}
