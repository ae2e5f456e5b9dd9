//! Configuration for the feed update example.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): connection details, keys
//! - CLI arguments: gateway/crossbar overrides

use clap::Parser;
use starknet::core::types::Felt;
use url::Url;

/// Environment configuration (connection details, credentials).
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// Private key for the Starknet account
    pub private_key: String,

    /// Path to the account JSON file (sncast format, `deployment.address`)
    pub starknet_account: String,

    /// RPC URL for the node
    pub starknet_rpc: String,

    /// Address of the example consumer contract
    pub example_address: String,

    /// Feed id to update (31-byte hex string)
    pub feed_id: String,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Read the account address out of the account JSON file.
    pub fn account_address(&self) -> Result<Felt, ConfigError> {
        let raw = std::fs::read_to_string(&self.starknet_account)
            .map_err(|e| ConfigError::AccountFileRead(self.starknet_account.clone(), e))?;
        let file: AccountFile = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::AccountFileParse(self.starknet_account.clone(), e))?;
        Felt::from_hex(&file.deployment.address)
            .map_err(|e| ConfigError::InvalidField("account address", e.to_string()))
    }

    pub fn example_address(&self) -> Result<Felt, ConfigError> {
        Felt::from_hex(&self.example_address)
            .map_err(|e| ConfigError::InvalidField("example_address", e.to_string()))
    }

    pub fn private_key(&self) -> Result<Felt, ConfigError> {
        Felt::from_hex(&self.private_key)
            .map_err(|e| ConfigError::InvalidField("private_key", e.to_string()))
    }
}

#[derive(Debug, serde::Deserialize)]
struct AccountFile {
    deployment: Deployment,
}

#[derive(Debug, serde::Deserialize)]
struct Deployment {
    address: String,
}

/// CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "feed-update")]
#[command(about = "Fetches a Switchboard feed update and pushes it to the example consumer")]
pub struct CliConfig {
    /// Gateway URL override (default: the network's gateway)
    #[arg(long)]
    pub gateway: Option<Url>,

    /// Crossbar URL override for job-definition fetches
    #[arg(long)]
    pub crossbar: Option<Url>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read account file {0}: {1}")]
    AccountFileRead(String, std::io::Error),

    #[error("Cannot parse account file {0}: {1}")]
    AccountFileParse(String, serde_json::Error),

    #[error("Invalid {0}: {1}")]
    InvalidField(&'static str, String),
}
