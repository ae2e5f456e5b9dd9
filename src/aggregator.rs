//! Aggregator (price feed) wrapper: lifecycle management, read models and
//! the gateway update-fetch flow.

use futures::try_join;
use starknet::accounts::ConnectedAccount;
use starknet::core::types::Felt;
use tracing::{debug, info};
use url::Url;

use crate::client::{State, StateOverrides, SwitchboardClient};
use crate::contract::{FeltReader, push_byte_array, push_u256, selectors};
use crate::error::SwitchboardError;
use crate::gateway::{CrossbarClient, FeedEvalResponse, FetchSignaturesRequest};
use crate::update::{SignedResponse, UpdateRecord, assemble_updates};
use crate::wire::{self, Uint256};

/// On-chain max_variance is stored scaled by 1e9; the gateway expects the
/// unscaled percentage.
const VARIANCE_SCALE: u64 = 1_000_000_000;

#[derive(Clone, Debug)]
pub struct AggregatorInitParams {
    /// 31-byte hex id; generated randomly when absent.
    pub aggregator_id: Option<String>,
    pub authority: Felt,
    /// Display name, at most 31 ASCII characters.
    pub name: String,
    pub tolerated_delta: u64,
    pub max_staleness: u64,
    pub feed_hash: String,
    pub max_variance: u64,
    pub min_responses: u32,
    pub min_samples: u8,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug)]
pub struct AggregatorSetConfigsParams {
    pub name: String,
    pub tolerated_delta: u64,
    pub feed_hash: String,
    pub max_variance: u64,
    pub min_responses: u32,
    pub min_samples: u8,
    pub max_staleness: u64,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug)]
pub struct AggregatorSetAuthorityParams {
    pub authority: Felt,
    pub overrides: StateOverrides,
}

/// Latest aggregated result and its window statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentResult {
    pub result: i128,
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    pub min_result: i128,
    pub max_result: i128,
    pub stdev: u128,
    pub range: i128,
    pub mean: i128,
}

#[derive(Clone, Debug)]
pub struct AggregatorData {
    pub aggregator_id: Felt,
    pub authority: Felt,
    pub name: String,
    pub queue_id: Uint256,
    pub tolerated_delta: u64,
    pub feed_hash: Uint256,
    pub created_at: u64,
    pub max_variance: u64,
    pub min_responses: u32,
    pub min_samples: u8,
    pub max_staleness: u64,
    pub current_result: CurrentResult,
    pub update_idx: u64,
}

/// Feed parameters the gateway request is built from; taken from the chain
/// unless supplied directly.
#[derive(Clone, Debug)]
pub struct FeedConfigs {
    /// 32-byte hex feed hash (crossbar storage key).
    pub feed_hash: String,
    pub max_variance: u64,
    pub min_responses: u32,
    pub min_samples: u8,
}

#[derive(Clone, Debug, Default)]
pub struct FetchUpdateParams {
    pub gateway: Option<Url>,
    pub crossbar_url: Option<Url>,
    /// Job definitions; fetched from crossbar by feed hash when absent.
    pub jobs: Option<Vec<serde_json::Value>>,
    /// Feed parameters; read from the chain when absent.
    pub feed_configs: Option<FeedConfigs>,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug)]
pub struct FetchUpdateResponse {
    /// Serialized update records, ordered by oracle timestamp.
    pub updates: Vec<UpdateRecord>,
    pub responses: Vec<FeedEvalResponse>,
    pub failures: Vec<String>,
}

fn create_aggregator_calldata(
    params: &AggregatorInitParams,
    aggregator_id: Felt,
    queue_id: Uint256,
) -> Result<Vec<Felt>, SwitchboardError> {
    let mut calldata = Vec::new();
    calldata.push(aggregator_id);
    calldata.push(params.authority);
    calldata.push(wire::encode_short_string(&params.name)?);
    push_u256(&mut calldata, queue_id);
    calldata.push(Felt::from(params.tolerated_delta));
    push_u256(&mut calldata, Uint256::from_hex(&params.feed_hash)?);
    calldata.push(Felt::from(params.max_variance));
    calldata.push(Felt::from(params.min_responses));
    calldata.push(Felt::from(params.min_samples));
    calldata.push(Felt::from(params.max_staleness));
    Ok(calldata)
}

fn update_aggregator_calldata(
    params: &AggregatorSetConfigsParams,
    aggregator_id: Felt,
) -> Result<Vec<Felt>, SwitchboardError> {
    let mut calldata = Vec::new();
    calldata.push(aggregator_id);
    calldata.push(wire::encode_short_string(&params.name)?);
    calldata.push(Felt::from(params.tolerated_delta));
    push_u256(&mut calldata, Uint256::from_hex(&params.feed_hash)?);
    calldata.push(Felt::from(params.max_variance));
    calldata.push(Felt::from(params.min_responses));
    calldata.push(Felt::from(params.min_samples));
    calldata.push(Felt::from(params.max_staleness));
    Ok(calldata)
}

fn decode_current_result(reader: &mut FeltReader<'_>) -> Result<CurrentResult, SwitchboardError> {
    Ok(CurrentResult {
        result: reader.i128()?,
        min_timestamp: reader.u64()?,
        max_timestamp: reader.u64()?,
        min_result: reader.i128()?,
        max_result: reader.i128()?,
        stdev: reader.u128()?,
        range: reader.i128()?,
        mean: reader.i128()?,
    })
}

fn decode_aggregator(reader: &mut FeltReader<'_>) -> Result<AggregatorData, SwitchboardError> {
    Ok(AggregatorData {
        aggregator_id: reader.felt()?,
        authority: reader.felt()?,
        name: wire::decode_short_string(&reader.felt()?),
        queue_id: reader.u256()?,
        tolerated_delta: reader.u64()?,
        feed_hash: reader.u256()?,
        created_at: reader.u64()?,
        max_variance: reader.u64()?,
        min_responses: reader.u32()?,
        min_samples: reader.u8()?,
        max_staleness: reader.u64()?,
        current_result: decode_current_result(reader)?,
        update_idx: reader.u64()?,
    })
}

/// Handle on one aggregator, identified by its 31-byte hex id.
pub struct Aggregator<'a, A> {
    client: &'a SwitchboardClient<A>,
    id: String,
}

impl<'a, A: ConnectedAccount + Sync> Aggregator<'a, A> {
    pub fn new(client: &'a SwitchboardClient<A>, id: &str) -> Self {
        Self {
            client,
            id: wire::trim_hex_prefix(id).to_string(),
        }
    }

    /// Hex id, no prefix.
    pub fn id(&self) -> &str {
        &self.id
    }

    fn id_felt(&self) -> Result<Felt, SwitchboardError> {
        Felt::from_hex(&format!("0x{}", self.id))
            .map_err(|e| SwitchboardError::InvalidHex(format!("aggregator id: {e}")))
    }

    /// Create a new aggregator on the connected network's oracle queue.
    pub async fn init(
        client: &'a SwitchboardClient<A>,
        params: &AggregatorInitParams,
    ) -> Result<Aggregator<'a, A>, SwitchboardError> {
        let state = client.fetch_state_with(&params.overrides).await?;
        let id = params
            .aggregator_id
            .clone()
            .unwrap_or_else(wire::random_id);
        let aggregator = Aggregator::new(client, &id);
        let calldata =
            create_aggregator_calldata(params, aggregator.id_felt()?, state.oracle_queue)?;
        let contract = client.contract(&state);
        contract
            .invoke(
                "create_aggregator",
                vec![contract.call(selectors::CREATE_AGGREGATOR, calldata)],
            )
            .await?;
        info!(aggregator_id = %aggregator.id, "aggregator created");
        Ok(aggregator)
    }

    pub async fn set_authority(
        &self,
        params: &AggregatorSetAuthorityParams,
    ) -> Result<(), SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let contract = self.client.contract(&state);
        let calldata = vec![self.id_felt()?, params.authority];
        contract
            .invoke(
                "set_aggregator_authority",
                vec![contract.call(selectors::SET_AGGREGATOR_AUTHORITY, calldata)],
            )
            .await?;
        Ok(())
    }

    pub async fn set_configs(
        &self,
        params: &AggregatorSetConfigsParams,
    ) -> Result<(), SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let contract = self.client.contract(&state);
        let calldata = update_aggregator_calldata(params, self.id_felt()?)?;
        contract
            .invoke(
                "update_aggregator",
                vec![contract.call(selectors::UPDATE_AGGREGATOR, calldata)],
            )
            .await?;
        Ok(())
    }

    pub async fn load_data(&self) -> Result<AggregatorData, SwitchboardError> {
        let state = self.client.fetch_state().await?;
        let contract = self.client.contract(&state);
        let felts = contract
            .view(selectors::GET_AGGREGATOR, vec![self.id_felt()?])
            .await?;
        decode_aggregator(&mut FeltReader::new(&felts))
    }

    /// Latest result without the full aggregator record.
    pub async fn latest_result(&self) -> Result<CurrentResult, SwitchboardError> {
        let state = self.client.fetch_state().await?;
        let contract = self.client.contract(&state);
        let felts = contract
            .view(selectors::LATEST_RESULT, vec![self.id_felt()?])
            .await?;
        decode_current_result(&mut FeltReader::new(&felts))
    }

    pub async fn load_all(
        client: &SwitchboardClient<A>,
    ) -> Result<Vec<AggregatorData>, SwitchboardError> {
        let state = client.fetch_state().await?;
        let contract = client.contract(&state);
        let felts = contract
            .view(selectors::GET_ALL_AGGREGATORS, Vec::new())
            .await?;
        let mut reader = FeltReader::new(&felts);
        let count = reader.length()?;
        let mut aggregators = Vec::with_capacity(count);
        for _ in 0..count {
            aggregators.push(decode_aggregator(&mut reader)?);
        }
        Ok(aggregators)
    }

    /// Fetch signed oracle responses for this feed and assemble them into
    /// submittable update records. No transaction is sent.
    pub async fn fetch_update(
        &self,
        params: &FetchUpdateParams,
    ) -> Result<FetchUpdateResponse, SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let configs = match &params.feed_configs {
            Some(configs) => configs.clone(),
            None => {
                let data = self.load_data().await?;
                FeedConfigs {
                    feed_hash: format!("0x{}", data.feed_hash.to_padded_hex()),
                    max_variance: data.max_variance,
                    min_responses: data.min_responses,
                    min_samples: data.min_samples,
                }
            }
        };

        let crossbar = params
            .crossbar_url
            .clone()
            .map(CrossbarClient::new)
            .unwrap_or_else(CrossbarClient::default_client);
        let (queue, jobs) = try_join!(
            self.client.queue_handle(&state, params.gateway.clone()),
            async {
                match &params.jobs {
                    Some(jobs) => Ok(jobs.clone()),
                    None => crossbar.fetch(&configs.feed_hash).await,
                }
            }
        )?;

        let request = FetchSignaturesRequest::new(
            &jobs,
            configs.max_variance / VARIANCE_SCALE,
            configs.min_responses,
            u32::from(configs.min_samples),
        );
        let result = queue.gateway().fetch_signatures(&request).await?;
        debug!(
            responses = result.responses.len(),
            failures = result.failures.len(),
            "gateway returned signatures"
        );

        let signed: Vec<SignedResponse> = result
            .responses
            .iter()
            .map(FeedEvalResponse::to_signed_response)
            .collect();
        let updates = assemble_updates(&self.id, &signed)?;
        Ok(FetchUpdateResponse {
            updates,
            responses: result.responses,
            failures: result.failures,
        })
    }

    /// Fetch an update and submit it, one `update_feed_data` call per record
    /// in a single invoke.
    pub async fn submit_update(
        &self,
        params: &FetchUpdateParams,
    ) -> Result<FetchUpdateResponse, SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let result = self.fetch_update(params).await?;
        let contract = self.client.contract(&state);
        let calls = result
            .updates
            .iter()
            .map(|update| {
                let mut calldata = Vec::new();
                push_byte_array(&mut calldata, &update.wire);
                contract.call(selectors::UPDATE_FEED_DATA, calldata)
            })
            .collect();
        contract.invoke("update_feed_data", calls).await?;
        info!(updates = result.updates.len(), "feed updates submitted");
        Ok(result)
    }
}
