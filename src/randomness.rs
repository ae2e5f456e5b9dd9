//! Randomness wrapper: roll lifecycle, oracle commitment and the gateway
//! reveal flow.

use starknet::accounts::ConnectedAccount;
use starknet::core::types::Felt;
use tracing::info;
use url::Url;

use crate::client::{StateOverrides, SwitchboardClient};
use crate::contract::{FeltReader, push_u256, selectors};
use crate::error::SwitchboardError;
use crate::gateway::{RandomnessRevealRequest, RandomnessRevealResponse};
use crate::update::{UpdateRecord, encode_randomness_reveal};
use crate::wire::{ByteArray, Uint256};

#[derive(Clone, Debug)]
pub struct RandomnessInitParams {
    pub randomness_id: Uint256,
    pub authority: Felt,
    /// Seconds the roll must age before an oracle may settle it.
    pub min_settlement_delay: u64,
    /// Queue to roll against; the network's oracle queue when absent.
    pub queue_id: Option<Uint256>,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug)]
pub struct RandomnessSetConfigsParams {
    pub min_settlement_delay: u64,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug, Default)]
pub struct RandomnessCommitParams {
    /// Oracle expected to produce the reveal. Required; there is no
    /// on-chain derivation for it here.
    pub oracle_id: Option<Uint256>,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug, Default)]
pub struct RandomnessResolveParams {
    pub gateway: Option<Url>,
    pub overrides: StateOverrides,
}

#[derive(Clone, Debug)]
pub struct ResolveResponse {
    pub update: UpdateRecord,
    pub response: RandomnessRevealResponse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessResult {
    pub oracle_id: Uint256,
    /// The settling oracle's secp256k1 signer as an EthAddress felt.
    pub oracle_authority: Felt,
    pub value: Uint256,
    pub settled_at: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessData {
    pub randomness_id: Uint256,
    pub queue_id: Uint256,
    pub created_at: u64,
    pub authority: Felt,
    pub roll_timestamp: Uint256,
    pub min_settlement_delay: u64,
    pub result: RandomnessResult,
}

fn decode_randomness_result(
    reader: &mut FeltReader<'_>,
) -> Result<RandomnessResult, SwitchboardError> {
    Ok(RandomnessResult {
        oracle_id: reader.u256()?,
        oracle_authority: reader.felt()?,
        value: reader.u256()?,
        settled_at: reader.u64()?,
    })
}

fn decode_randomness(reader: &mut FeltReader<'_>) -> Result<RandomnessData, SwitchboardError> {
    Ok(RandomnessData {
        randomness_id: reader.u256()?,
        queue_id: reader.u256()?,
        created_at: reader.u64()?,
        authority: reader.felt()?,
        roll_timestamp: reader.u256()?,
        min_settlement_delay: reader.u64()?,
        result: decode_randomness_result(reader)?,
    })
}

/// Handle on one randomness account.
pub struct Randomness<'a, A> {
    client: &'a SwitchboardClient<A>,
    id: Uint256,
}

impl<'a, A: ConnectedAccount + Sync> Randomness<'a, A> {
    pub fn new(client: &'a SwitchboardClient<A>, id: Uint256) -> Self {
        Self { client, id }
    }

    pub fn id(&self) -> Uint256 {
        self.id
    }

    pub async fn init(
        client: &'a SwitchboardClient<A>,
        params: &RandomnessInitParams,
    ) -> Result<Randomness<'a, A>, SwitchboardError> {
        let state = client.fetch_state_with(&params.overrides).await?;
        let queue_id = params.queue_id.unwrap_or(state.oracle_queue);
        let mut calldata = Vec::new();
        push_u256(&mut calldata, params.randomness_id);
        push_u256(&mut calldata, queue_id);
        calldata.push(params.authority);
        calldata.push(Felt::from(params.min_settlement_delay));
        let contract = client.contract(&state);
        contract
            .invoke(
                "create_randomness",
                vec![contract.call(selectors::CREATE_RANDOMNESS, calldata)],
            )
            .await?;
        info!(randomness_id = %params.randomness_id.to_hex(), "randomness created");
        Ok(Randomness::new(client, params.randomness_id))
    }

    pub async fn set_configs(
        &self,
        params: &RandomnessSetConfigsParams,
    ) -> Result<(), SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let contract = self.client.contract(&state);
        let mut calldata = Vec::new();
        push_u256(&mut calldata, self.id);
        calldata.push(Felt::from(params.min_settlement_delay));
        contract
            .invoke(
                "update_randomness",
                vec![contract.call(selectors::UPDATE_RANDOMNESS, calldata)],
            )
            .await?;
        Ok(())
    }

    /// Commit the roll to an oracle, starting the settlement clock.
    pub async fn commit(
        &self,
        params: &RandomnessCommitParams,
    ) -> Result<(), SwitchboardError> {
        let oracle_id = params.oracle_id.ok_or_else(|| {
            SwitchboardError::Configuration(
                "commit requires an oracle id; pick one from the queue's oracle set"
                    .to_string(),
            )
        })?;
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let contract = self.client.contract(&state);
        let mut calldata = Vec::new();
        push_u256(&mut calldata, self.id);
        push_u256(&mut calldata, oracle_id);
        contract
            .invoke(
                "commit_randomness",
                vec![contract.call(selectors::COMMIT_RANDOMNESS, calldata)],
            )
            .await?;
        Ok(())
    }

    /// Fetch the reveal from the gateway and assemble the settlement record.
    /// No transaction is sent; the record goes through `update_feed_data`.
    pub async fn resolve(
        &self,
        params: &RandomnessResolveParams,
    ) -> Result<ResolveResponse, SwitchboardError> {
        let state = self.client.fetch_state_with(&params.overrides).await?;
        let data = self.load_data().await?;
        if data.roll_timestamp.high != 0 {
            return Err(SwitchboardError::Decode(format!(
                "roll timestamp {} is not a valid unix time",
                data.roll_timestamp.to_hex()
            )));
        }
        let timestamp = u64::try_from(data.roll_timestamp.low).map_err(|_| {
            SwitchboardError::Decode(format!(
                "roll timestamp {} is not a valid unix time",
                data.roll_timestamp.to_hex()
            ))
        })?;

        let queue = self
            .client
            .queue_handle(&state, params.gateway.clone())
            .await?;
        let request = RandomnessRevealRequest {
            randomness_key: format!("0x{}", self.id.to_padded_hex()),
            timestamp,
            min_staleness_seconds: data.min_settlement_delay,
        };
        let response = queue.gateway().fetch_randomness_reveal(&request).await?;
        let hex = encode_randomness_reveal(
            &self.id,
            &response.value,
            &response.signature,
            response.recovery_id,
        )?;
        let wire = ByteArray::from_hex(&hex)?;
        Ok(ResolveResponse {
            update: UpdateRecord { hex, wire },
            response,
        })
    }

    pub async fn load_data(&self) -> Result<RandomnessData, SwitchboardError> {
        let state = self.client.fetch_state().await?;
        let contract = self.client.contract(&state);
        let mut calldata = Vec::new();
        push_u256(&mut calldata, self.id);
        let felts = contract.view(selectors::GET_RANDOMNESS, calldata).await?;
        decode_randomness(&mut FeltReader::new(&felts))
    }

    pub async fn load_all(
        client: &SwitchboardClient<A>,
    ) -> Result<Vec<RandomnessData>, SwitchboardError> {
        let state = client.fetch_state().await?;
        let contract = client.contract(&state);
        let felts = contract
            .view(selectors::GET_ALL_RANDOMNESS, Vec::new())
            .await?;
        let mut reader = FeltReader::new(&felts);
        let count = reader.length()?;
        let mut rolls = Vec::with_capacity(count);
        for _ in 0..count {
            rolls.push(decode_randomness(&mut reader)?);
        }
        Ok(rolls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_randomness_round_trip() {
        let mut felts = Vec::new();
        push_u256(&mut felts, Uint256 { low: 1, high: 2 });
        push_u256(&mut felts, Uint256 { low: 3, high: 4 });
        felts.push(Felt::from(1_700_000_000u64));
        felts.push(Felt::from(0xaau64));
        push_u256(&mut felts, Uint256 { low: 1_700_000_100, high: 0 });
        felts.push(Felt::from(30u64));
        // result
        push_u256(&mut felts, Uint256 { low: 9, high: 0 });
        felts.push(Felt::from(0xbbu64));
        push_u256(&mut felts, Uint256 { low: 0xdead, high: 0xbeef });
        felts.push(Felt::from(1_700_000_200u64));

        let data = decode_randomness(&mut FeltReader::new(&felts)).unwrap();
        assert_eq!(data.randomness_id, Uint256 { low: 1, high: 2 });
        assert_eq!(data.queue_id, Uint256 { low: 3, high: 4 });
        assert_eq!(data.created_at, 1_700_000_000);
        assert_eq!(data.roll_timestamp.low, 1_700_000_100);
        assert_eq!(data.min_settlement_delay, 30);
        assert_eq!(
            data.result.value,
            Uint256 { low: 0xdead, high: 0xbeef }
        );
        assert_eq!(data.result.settled_at, 1_700_000_200);
    }

    #[test]
    fn test_decode_randomness_truncated_fails() {
        let felts = vec![Felt::ONE];
        assert!(matches!(
            decode_randomness(&mut FeltReader::new(&felts)),
            Err(SwitchboardError::Decode(_))
        ));
    }
}
