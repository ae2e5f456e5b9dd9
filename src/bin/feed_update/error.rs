//! Error types for the feed update example.

use switchboard_starknet::error::SwitchboardError;

use crate::config::ConfigError;

/// Main error type for the feed update example.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment configuration error: {0}")]
    EnvConfig(#[from] envy::Error),

    #[error("Switchboard SDK error: {0}")]
    Switchboard(#[from] SwitchboardError),

    #[error("Provider error: {0}")]
    Provider(#[from] starknet::providers::ProviderError),

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),

    #[error("No oracle responses for feed {0}")]
    NoUpdates(String),
}

pub type Result<T> = std::result::Result<T, Error>;
