//! Command-line interface for custody delegation chains
//!
//! Issue a signed root chain, disclose chosen claims, extend the chain as a
//! relay and validate it as the final verifier. Every step reads and writes
//! JSON files; `demo` runs all four parties in one process.

use anyhow::Result;
use clap::{Parser, Subcommand};
use custody_cli::commands::{
    demo::{self, DemoArgs},
    disclose::{self, DiscloseArgs},
    extend::{self, ExtendArgs},
    issue::{self, IssueArgs},
    keygen::{self, KeygenArgs},
    validate::{self, ValidateArgs},
};
use custody_cli::config::CustodyConfig;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "custody")]
#[command(about = "Custody - chained, selectively disclosable delegation tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 root signing key
    Keygen(KeygenArgs),
    /// Issue a root chain
    Issue(IssueArgs),
    /// Reveal chosen claims from a node bundle
    Disclose(DiscloseArgs),
    /// Validate a chain and append a relay node
    Extend(ExtendArgs),
    /// Validate a chain with disclosures and requirements
    Validate(ValidateArgs),
    /// Run the four-party delegation flow in-process
    Demo(DemoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CustodyConfig::load(cli.config.as_deref())?;

    // Initialize logging; -v wins over the configured level
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.log.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();
    debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Keygen(args) => keygen::run(&args)?,
        Commands::Issue(args) => issue::run(&args, config.chain)?,
        Commands::Disclose(args) => disclose::run(&args)?,
        Commands::Extend(args) => extend::run(&args, config.chain)?,
        Commands::Validate(args) => validate::run(&args, config.chain)?,
        Commands::Demo(args) => demo::run(&args, config.chain)?,
    }

    Ok(())
}
