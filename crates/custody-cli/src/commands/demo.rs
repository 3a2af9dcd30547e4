//! Four-party delegation run in-process
//!
//! 1. The authorization server issues `repo.read, repo.write, pr.open`.
//! 2. The host reveals only `repo.write` from the root node.
//! 3. A relay validates what it was shown and appends `{execute: true}`.
//! 4. The final verifier requires `0:repo.write` and `1:execute`.

use anyhow::{bail, Result};
use clap::Args;
use custody_chain::{
    require_true, ChainEngine, Ed25519Signer, ExtensionRequest, ExtensionResponse, FinalVerifier,
    IssuanceRequest, IssuingAuthority, Relay,
};
use custody_core::{ChainConfig, ClaimSet};
use tracing::info;

/// Arguments for the demo
#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Claim the host reveals from the root node
    #[arg(long, default_value = "repo.write")]
    pub reveal: String,

    /// Print every message exchanged
    #[arg(long)]
    pub show_messages: bool,
}

/// Run the flow and print the final decision
pub fn run(args: &DemoArgs, config: ChainConfig) -> Result<()> {
    let response = run_flow(&args.reveal, config, args.show_messages)?;
    println!("{}", serde_json::to_string_pretty(&response.downstream_response)?);
    if response.downstream_response["authorized"] != true {
        bail!("final verifier refused the delegated request");
    }
    Ok(())
}

/// Drive all four parties and return the relay's upstream response
pub fn run_flow(reveal: &str, config: ChainConfig, show: bool) -> Result<ExtensionResponse> {
    let authority = IssuingAuthority::new(
        ChainEngine::new(config)?,
        Ed25519Signer::generate(),
        "spiffe://example.org/AS",
    );
    let relay = Relay::new(
        ChainEngine::new(config)?,
        "spiffe://example.org/server1",
        ClaimSet::from_permissions(&["execute"]),
    );
    let verifier = FinalVerifier::new(
        ChainEngine::new(config)?,
        require_true(vec![
            (0, "repo.write".to_string()),
            (1, "execute".to_string()),
        ]),
    );

    let request = IssuanceRequest {
        permissions: vec![
            "repo.read".to_string(),
            "repo.write".to_string(),
            "pr.open".to_string(),
        ],
    };
    let issued = authority.issue(&request)?;
    info!(claims = issued.key_order.len(), "authority issued root chain");
    show_message(show, "issuance response", &issued)?;

    let extension = ExtensionRequest {
        chain: issued.chain.clone(),
        disclosures: vec![issued.disclose(reveal)?],
    };
    info!(%reveal, "host disclosed root claim to relay");
    show_message(show, "extension request", &extension)?;

    let forward = relay.handle(&extension)?;
    show_message(show, "validation request", &forward.downstream)?;

    let decision = verifier.handle(&forward.downstream);
    info!(authorized = decision.authorized, "final verifier decided");
    let response = forward.into_response(serde_json::to_value(&decision)?);
    show_message(show, "extension response", &response)?;
    Ok(response)
}

fn show_message<T: serde::Serialize>(show: bool, label: &str, message: &T) -> Result<()> {
    if show {
        println!("--- {label} ---");
        println!("{}", serde_json::to_string_pretty(message)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_authorizes_repo_write() {
        let response = run_flow("repo.write", ChainConfig::default(), false).unwrap();
        assert_eq!(response.downstream_response["authorized"], true);
        assert!(response.new_node_disclosure.revealed_indices().len() == 1);
    }

    #[test]
    fn test_demo_denies_other_reveal() {
        let response = run_flow("repo.read", ChainConfig::default(), false).unwrap();
        assert_eq!(response.downstream_response["authorized"], false);
        assert_eq!(response.downstream_response["error_code"], "POLICY/DENIED");
    }

    #[test]
    fn test_demo_unknown_claim_fails() {
        assert!(run_flow("admin", ChainConfig::default(), false).is_err());
    }
}
