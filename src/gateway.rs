//! HTTP clients for the off-chain collaborators: the oracle gateway
//! (signature aggregation, randomness reveals) and crossbar (job-definition
//! storage).
//!
//! Job definitions are opaque JSON; they are fetched, base64-encoded and
//! forwarded without interpretation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::SwitchboardError;
use crate::update::SignedResponse;
use crate::wire::Uint256;

pub const DEFAULT_CROSSBAR_URL: &str = "https://crossbar.switchboard.xyz";

/// Base58 form of 32 zero bytes. Recent-blockhash pinning is not available
/// here, so requests always carry the zero hash.
pub const ZERO_RECENT_HASH: &str = "11111111111111111111111111111111";

const GATEWAY_API_PREFIX: &str = "gateway/api/v1";

#[derive(Clone, Debug, Serialize)]
pub struct FetchSignaturesRequest {
    pub api_version: String,
    pub jobs_b64_encoded: Vec<String>,
    pub recent_chainhash: String,
    pub signature_scheme: String,
    pub hash_scheme: String,
    pub num_oracles: u32,
    pub max_variance: u64,
    pub min_responses: u32,
    pub use_timestamp: bool,
}

impl FetchSignaturesRequest {
    pub fn new(
        jobs: &[serde_json::Value],
        max_variance: u64,
        min_responses: u32,
        num_oracles: u32,
    ) -> Self {
        Self {
            api_version: "1.0.0".to_string(),
            jobs_b64_encoded: encode_jobs(jobs),
            recent_chainhash: ZERO_RECENT_HASH.to_string(),
            signature_scheme: "Secp256k1".to_string(),
            hash_scheme: "Sha256".to_string(),
            num_oracles,
            max_variance,
            min_responses,
            use_timestamp: true,
        }
    }
}

/// One oracle's evaluation within a fetch-signatures response.
#[derive(Clone, Debug, Deserialize)]
pub struct FeedEvalResponse {
    #[serde(default)]
    pub oracle_pubkey: String,
    #[serde(default)]
    pub feed_hash: String,
    pub success_value: String,
    #[serde(default)]
    pub failure_error: String,
    pub signature: String,
    pub recovery_id: u8,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

impl FeedEvalResponse {
    pub fn to_signed_response(&self) -> SignedResponse {
        SignedResponse {
            value: self.success_value.clone(),
            timestamp: self.timestamp,
            signature: self.signature.clone(),
            recovery_id: self.recovery_id,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FetchSignaturesResponse {
    pub responses: Vec<FeedEvalResponse>,
    #[serde(default)]
    pub failures: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RandomnessRevealRequest {
    pub randomness_key: String,
    pub timestamp: u64,
    pub min_staleness_seconds: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RandomnessRevealResponse {
    pub value: Vec<u8>,
    pub signature: String,
    pub recovery_id: u8,
}

/// Base64-encode job definitions for transport to the gateway.
pub fn encode_jobs(jobs: &[serde_json::Value]) -> Vec<String> {
    jobs.iter().map(|job| BASE64.encode(job.to_string())).collect()
}

/// Client for one oracle gateway.
#[derive(Clone, Debug)]
pub struct Gateway {
    http: Client,
    base: Url,
}

impl Gateway {
    pub fn new(base: Url) -> Self {
        Self {
            http: Client::new(),
            base,
        }
    }

    pub fn url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, SwitchboardError> {
        let joined = format!(
            "{}/{GATEWAY_API_PREFIX}/{path}",
            self.base.as_str().trim_end_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    /// Health probe; run once when a queue handle is established.
    pub async fn test(&self) -> Result<(), SwitchboardError> {
        let resp = self.http.get(self.endpoint("test")?).send().await?;
        if !resp.status().is_success() {
            return Err(SwitchboardError::Gateway(format!(
                "gateway health check returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    pub async fn fetch_signatures(
        &self,
        request: &FetchSignaturesRequest,
    ) -> Result<FetchSignaturesResponse, SwitchboardError> {
        debug!(
            num_oracles = request.num_oracles,
            jobs = request.jobs_b64_encoded.len(),
            "fetching oracle signatures"
        );
        let resp = self
            .http
            .post(self.endpoint("fetch_signatures")?)
            .json(request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SwitchboardError::Gateway(format!(
                "fetch_signatures returned {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }

    pub async fn fetch_randomness_reveal(
        &self,
        request: &RandomnessRevealRequest,
    ) -> Result<RandomnessRevealResponse, SwitchboardError> {
        debug!(randomness_key = %request.randomness_key, "fetching randomness reveal");
        let resp = self
            .http
            .post(self.endpoint("randomness_reveal")?)
            .json(request)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SwitchboardError::Gateway(format!(
                "randomness_reveal returned {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}

/// A queue id paired with a health-checked gateway. Establishing one costs a
/// network round trip, which is why the client caches them.
#[derive(Clone, Debug)]
pub struct QueueHandle {
    queue_id: Uint256,
    gateway: Gateway,
}

impl QueueHandle {
    pub(crate) fn new(queue_id: Uint256, gateway: Gateway) -> Self {
        Self { queue_id, gateway }
    }

    pub async fn connect(queue_id: Uint256, gateway_url: Url) -> Result<Self, SwitchboardError> {
        let gateway = Gateway::new(gateway_url);
        gateway.test().await?;
        Ok(Self::new(queue_id, gateway))
    }

    pub fn queue_id(&self) -> Uint256 {
        self.queue_id
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}

#[derive(Debug, Deserialize)]
struct CrossbarFetchResponse {
    #[serde(default)]
    jobs: Vec<serde_json::Value>,
}

/// Client for the crossbar job-definition store.
#[derive(Clone, Debug)]
pub struct CrossbarClient {
    http: Client,
    base: Url,
}

impl CrossbarClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: Client::new(),
            base,
        }
    }

    pub fn default_client() -> Self {
        Self::new(Url::parse(DEFAULT_CROSSBAR_URL).expect("static url"))
    }

    /// Fetch the job definitions stored for a feed hash.
    pub async fn fetch(
        &self,
        feed_hash: &str,
    ) -> Result<Vec<serde_json::Value>, SwitchboardError> {
        let url = Url::parse(&format!(
            "{}/fetch/{feed_hash}",
            self.base.as_str().trim_end_matches('/')
        ))?;
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(SwitchboardError::Gateway(format!(
                "crossbar fetch returned {}",
                resp.status()
            )));
        }
        let body: CrossbarFetchResponse = resp.json().await?;
        if body.jobs.is_empty() {
            return Err(SwitchboardError::Gateway(format!(
                "no job definitions stored for feed hash {feed_hash}"
            )));
        }
        Ok(body.jobs)
    }
}
