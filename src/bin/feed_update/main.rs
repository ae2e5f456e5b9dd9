//! Feed update example for the Switchboard Starknet SDK.
//!
//! Fetches signed oracle responses for a feed and submits them to an
//! example consumer contract's `update(ByteArray)` entry point.

mod config;
mod error;

use std::process::exit;

use clap::Parser;
use starknet::accounts::{ExecutionEncoding, SingleOwnerAccount};
use starknet::core::types::Call;
use starknet::macros::selector;
use starknet::providers::jsonrpc::{HttpTransport, JsonRpcClient};
use starknet::providers::Provider;
use starknet::signers::{LocalWallet, SigningKey};
use switchboard_starknet::aggregator::{Aggregator, FetchUpdateParams};
use switchboard_starknet::client::SwitchboardClient;
use switchboard_starknet::contract::{push_byte_array, SwitchboardContract};
use tracing::{error, info};
use url::Url;

use config::{CliConfig, EnvConfig};
use error::{Error, Result};

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(env_config, cli_config).await {
        error!(%e, "Feed update failed");
        exit(1);
    }
}

async fn run(env_config: EnvConfig, cli_config: CliConfig) -> Result<()> {
    let node_url = Url::parse(&env_config.starknet_rpc)?;
    let provider = JsonRpcClient::new(HttpTransport::new(node_url));

    let signer = LocalWallet::from(SigningKey::from_secret_scalar(env_config.private_key()?));
    let address = env_config.account_address()?;
    let chain_id = provider.chain_id().await?;
    let account = SingleOwnerAccount::new(
        provider,
        signer,
        address,
        chain_id,
        ExecutionEncoding::New,
    );

    let client = SwitchboardClient::new(account);
    let aggregator = Aggregator::new(&client, &env_config.feed_id);

    let result = aggregator
        .fetch_update(&FetchUpdateParams {
            gateway: cli_config.gateway,
            crossbar_url: cli_config.crossbar,
            ..Default::default()
        })
        .await?;
    for failure in &result.failures {
        error!(%failure, "oracle response failed");
    }
    if result.updates.is_empty() {
        return Err(Error::NoUpdates(env_config.feed_id));
    }
    info!(
        updates = result.updates.len(),
        failures = result.failures.len(),
        "fetched feed update"
    );

    let example = SwitchboardContract::new(env_config.example_address()?, client.account());
    let calls: Vec<Call> = result
        .updates
        .iter()
        .map(|update| {
            let mut calldata = Vec::new();
            push_byte_array(&mut calldata, &update.wire);
            example.call(selector!("update"), calldata)
        })
        .collect();
    let tx_hash = example.invoke("update", calls).await?;
    info!(tx_hash = %format!("{:#x}", tx_hash), "feed update submitted");

    Ok(())
}
