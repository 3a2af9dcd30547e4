//! Generate an Ed25519 root signing key

use anyhow::{Context, Result};
use clap::Args;
use custody_chain::Ed25519Signer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments for key generation
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// File to write the hex-encoded secret key to
    #[arg(short, long, default_value = "issuer.key")]
    pub out: PathBuf,
}

/// Write a fresh secret key and print its public key
pub fn run(args: &KeygenArgs) -> Result<()> {
    let signer = Ed25519Signer::generate();
    fs::write(&args.out, signer.to_hex())
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    info!(path = %args.out.display(), "wrote signing key");
    println!("{}", signer.public_key_hex());
    Ok(())
}

/// Load a signer from a key file written by `keygen`
pub fn load_signer(path: &Path) -> Result<Ed25519Signer> {
    let secret =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ed25519Signer::from_hex(&secret).with_context(|| format!("invalid key in {}", path.display()))
}
