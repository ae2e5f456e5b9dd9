use starknet::providers::ProviderError;

/// Error surfaced by SDK operations.
///
/// Every failure carries enough context to identify the failed operation;
/// nothing is swallowed except the bounded state-fetch retry in
/// [`crate::client::SwitchboardClient::fetch_state`].
#[derive(Debug, thiserror::Error)]
pub enum SwitchboardError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid hex input: {0}")]
    InvalidHex(String),

    #[error("numeric value cannot be converted without precision loss: {0}")]
    PrecisionLoss(String),

    #[error("malformed oracle signature: {0}")]
    MalformedSignature(String),

    #[error("{operation}: transaction reverted: {reason}")]
    TransactionFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("failed to load switchboard state after {attempts} attempts")]
    StateFetchFailed { attempts: u32 },

    #[error("gateway request failed: {0}")]
    Gateway(String),

    #[error("malformed contract response: {0}")]
    Decode(String),

    #[error("account error: {0}")]
    Account(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<reqwest::Error> for SwitchboardError {
    fn from(value: reqwest::Error) -> Self {
        Self::Gateway(value.to_string())
    }
}

impl From<url::ParseError> for SwitchboardError {
    fn from(value: url::ParseError) -> Self {
        Self::Configuration(value.to_string())
    }
}
