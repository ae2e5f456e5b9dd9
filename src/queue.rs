//! Oracle queue wrapper: lifecycle management, oracle-set overrides and
//! read models.

use starknet::accounts::ConnectedAccount;
use starknet::core::types::Felt;
use tracing::info;

use crate::client::{StateOverrides, SwitchboardClient};
use crate::contract::{FeltReader, push_u256, selectors};
use crate::error::SwitchboardError;
use crate::wire::{self, Uint256};

#[derive(Clone, Debug)]
pub struct QueueInitParams {
    pub queue_id: Uint256,
    pub authority: Felt,
    /// Display name, at most 31 ASCII characters.
    pub name: String,
    pub fee: Uint256,
    pub fee_recipient: Felt,
    pub min_attestations: u64,
    pub tolerated_timestamp_delta: u64,
    pub oracle_validity_length: u64,
    /// Guardian queue securing attestations; the network default when
    /// absent.
    pub guardian_queue_id: Option<Uint256>,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug)]
pub struct QueueSetConfigsParams {
    pub name: String,
    pub fee: Uint256,
    pub fee_recipient: Felt,
    pub min_attestations: u64,
    pub tolerated_timestamp_delta: u64,
    pub oracle_validity_length: u64,
    pub guardian_queue_id: Uint256,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug)]
pub struct QueueSetAuthorityParams {
    pub authority: Felt,
    pub overrides: StateOverrides,
}

/// An attested oracle as stored on the queue. `authority` is the oracle's
/// secp256k1 signer as an EthAddress felt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OracleConfig {
    pub authority: Felt,
    pub oracle_id: Uint256,
    pub queue_id: Uint256,
    pub mr_enclave: Uint256,
    pub expiration_time: u64,
    pub fees_owed: u64,
}

#[derive(Clone, Debug)]
pub struct QueueData {
    pub queue_id: Uint256,
    pub authority: Felt,
    pub name: String,
    pub fee: Uint256,
    pub fee_recipient: Felt,
    pub min_attestations: u64,
    pub tolerated_timestamp_delta: u64,
    pub oracle_validity_length: u64,
    pub last_queue_override: u64,
    pub guardian_queue_id: Uint256,
    pub oracles: Vec<OracleConfig>,
}

fn create_queue_calldata(
    params: &QueueInitParams,
    guardian_queue_id: Uint256,
) -> Result<Vec<Felt>, SwitchboardError> {
    let mut calldata = Vec::new();
    push_u256(&mut calldata, params.queue_id);
    calldata.push(params.authority);
    calldata.push(wire::encode_short_string(&params.name)?);
    push_u256(&mut calldata, params.fee);
    calldata.push(params.fee_recipient);
    calldata.push(Felt::from(params.min_attestations));
    calldata.push(Felt::from(params.tolerated_timestamp_delta));
    calldata.push(Felt::from(params.oracle_validity_length));
    push_u256(&mut calldata, guardian_queue_id);
    Ok(calldata)
}

fn update_queue_calldata(
    params: &QueueSetConfigsParams,
    queue_id: Uint256,
) -> Result<Vec<Felt>, SwitchboardError> {
    let mut calldata = Vec::new();
    push_u256(&mut calldata, queue_id);
    calldata.push(wire::encode_short_string(&params.name)?);
    push_u256(&mut calldata, params.fee);
    calldata.push(params.fee_recipient);
    calldata.push(Felt::from(params.min_attestations));
    calldata.push(Felt::from(params.tolerated_timestamp_delta));
    calldata.push(Felt::from(params.oracle_validity_length));
    push_u256(&mut calldata, params.guardian_queue_id);
    Ok(calldata)
}

fn push_oracle(out: &mut Vec<Felt>, oracle: &OracleConfig) {
    out.push(oracle.authority);
    push_u256(out, oracle.oracle_id);
    push_u256(out, oracle.queue_id);
    push_u256(out, oracle.mr_enclave);
    out.push(Felt::from(oracle.expiration_time));
    out.push(Felt::from(oracle.fees_owed));
}

fn decode_oracle(reader: &mut FeltReader<'_>) -> Result<OracleConfig, SwitchboardError> {
    Ok(OracleConfig {
        authority: reader.felt()?,
        oracle_id: reader.u256()?,
        queue_id: reader.u256()?,
        mr_enclave: reader.u256()?,
        expiration_time: reader.u64()?,
        fees_owed: reader.u64()?,
    })
}

fn decode_queue(reader: &mut FeltReader<'_>) -> Result<QueueData, SwitchboardError> {
    let queue_id = reader.u256()?;
    let authority = reader.felt()?;
    let name = wire::decode_short_string(&reader.felt()?);
    let fee = reader.u256()?;
    let fee_recipient = reader.felt()?;
    let min_attestations = reader.u64()?;
    let tolerated_timestamp_delta = reader.u64()?;
    let oracle_validity_length = reader.u64()?;
    let last_queue_override = reader.u64()?;
    let guardian_queue_id = reader.u256()?;
    let oracle_count = reader.length()?;
    let mut oracles = Vec::with_capacity(oracle_count);
    for _ in 0..oracle_count {
        oracles.push(decode_oracle(reader)?);
    }
    Ok(QueueData {
        queue_id,
        authority,
        name,
        fee,
        fee_recipient,
        min_attestations,
        tolerated_timestamp_delta,
        oracle_validity_length,
        last_queue_override,
        guardian_queue_id,
        oracles,
    })
}

/// Handle on one oracle queue.
pub struct Queue<'a, A> {
    client: &'a SwitchboardClient<A>,
    id: Uint256,
}

impl<'a, A: ConnectedAccount + Sync> Queue<'a, A> {
    pub fn new(client: &'a SwitchboardClient<A>, id: Uint256) -> Self {
        Self { client, id }
    }

    pub fn id(&self) -> Uint256 {
        self.id
    }

    pub async fn init(
        client: &'a SwitchboardClient<A>,
        params: &QueueInitParams,
    ) -> Result<Queue<'a, A>, SwitchboardError> {
        let state = client.fetch_state_with(&params.overrides).await?;
        let guardian = params.guardian_queue_id.unwrap_or(state.guardian_queue);
        let calldata = create_queue_calldata(params, guardian)?;
        let contract = client.contract(&state);
        contract
            .invoke(
                "create_queue",
                vec![contract.call(selectors::CREATE_QUEUE, calldata)],
            )
            .await?;
        info!(queue_id = %params.queue_id.to_hex(), "queue created");
        Ok(Queue::new(client, params.queue_id))
    }

    pub async fn set_authority(
        &self,
        params: &QueueSetAuthorityParams,
    ) -> Result<(), SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let contract = self.client.contract(&state);
        let mut calldata = Vec::new();
        push_u256(&mut calldata, self.id);
        calldata.push(params.authority);
        contract
            .invoke(
                "set_queue_authority",
                vec![contract.call(selectors::SET_QUEUE_AUTHORITY, calldata)],
            )
            .await?;
        Ok(())
    }

    pub async fn set_configs(
        &self,
        params: &QueueSetConfigsParams,
    ) -> Result<(), SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let contract = self.client.contract(&state);
        let calldata = update_queue_calldata(params, self.id)?;
        contract
            .invoke(
                "update_queue",
                vec![contract.call(selectors::UPDATE_QUEUE, calldata)],
            )
            .await?;
        Ok(())
    }

    /// Replace the queue's attested oracle set wholesale.
    pub async fn override_oracles(
        &self,
        oracles: &[OracleConfig],
        overrides: &StateOverrides,
    ) -> Result<(), SwitchboardError> {
        let state = self.client.fetch_state_with(overrides).await?;
        let contract = self.client.contract(&state);
        let mut calldata = Vec::new();
        push_u256(&mut calldata, self.id);
        calldata.push(Felt::from(oracles.len()));
        for oracle in oracles {
            push_oracle(&mut calldata, oracle);
        }
        contract
            .invoke(
                "override_queue_oracles",
                vec![contract.call(selectors::OVERRIDE_QUEUE_ORACLES, calldata)],
            )
            .await?;
        info!(queue_id = %self.id.to_hex(), oracles = oracles.len(), "queue oracles overridden");
        Ok(())
    }

    pub async fn load_data(&self) -> Result<QueueData, SwitchboardError> {
        let state = self.client.fetch_state().await?;
        let contract = self.client.contract(&state);
        let mut calldata = Vec::new();
        push_u256(&mut calldata, self.id);
        let felts = contract.view(selectors::GET_QUEUE, calldata).await?;
        decode_queue(&mut FeltReader::new(&felts))
    }

    pub async fn load_all(
        client: &SwitchboardClient<A>,
    ) -> Result<Vec<QueueData>, SwitchboardError> {
        let state = client.fetch_state().await?;
        let contract = client.contract(&state);
        let felts = contract.view(selectors::GET_ALL_QUEUES, Vec::new()).await?;
        let mut reader = FeltReader::new(&felts);
        let count = reader.length()?;
        let mut queues = Vec::with_capacity(count);
        for _ in 0..count {
            queues.push(decode_queue(&mut reader)?);
        }
        Ok(queues)
    }
}
