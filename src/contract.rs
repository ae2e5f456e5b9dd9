//! Calldata marshalling and submission against the deployed Switchboard
//! contract.
//!
//! starknet-rs has no ABI codegen for external contracts, so every entry
//! point encodes and decodes explicitly; field order follows the deployed
//! ABI and must not be reordered.

use std::time::Duration;

use starknet::accounts::{Account, ConnectedAccount};
use starknet::core::types::{
    BlockId, BlockTag, Call, ExecutionResult, Felt, FunctionCall, StarknetError,
};
use starknet::providers::{Provider, ProviderError};
use tracing::debug;

use crate::error::SwitchboardError;
use crate::wire::{self, ByteArray, Uint256};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Entry point selectors of the deployed contract.
pub mod selectors {
    use starknet::core::types::Felt;
    use starknet::macros::selector;

    pub const UPDATE_FEED_DATA: Felt = selector!("update_feed_data");

    pub const LATEST_RESULT: Felt = selector!("latest_result");
    pub const GET_AGGREGATOR: Felt = selector!("get_aggregator");
    pub const GET_ALL_AGGREGATORS: Felt = selector!("get_all_aggregators");
    pub const CREATE_AGGREGATOR: Felt = selector!("create_aggregator");
    pub const UPDATE_AGGREGATOR: Felt = selector!("update_aggregator");
    pub const SET_AGGREGATOR_AUTHORITY: Felt = selector!("set_aggregator_authority");

    pub const GET_QUEUE: Felt = selector!("get_queue");
    pub const GET_ALL_QUEUES: Felt = selector!("get_all_queues");
    pub const CREATE_QUEUE: Felt = selector!("create_queue");
    pub const UPDATE_QUEUE: Felt = selector!("update_queue");
    pub const SET_QUEUE_AUTHORITY: Felt = selector!("set_queue_authority");
    pub const OVERRIDE_QUEUE_ORACLES: Felt = selector!("override_queue_oracles");

    pub const GET_RANDOMNESS: Felt = selector!("get_randomness");
    pub const GET_ALL_RANDOMNESS: Felt = selector!("get_all_randomness");
    pub const CREATE_RANDOMNESS: Felt = selector!("create_randomness");
    pub const UPDATE_RANDOMNESS: Felt = selector!("update_randomness");
    pub const COMMIT_RANDOMNESS: Felt = selector!("commit_randomness");
}

/// Append a u256 as its `[low, high]` limb pair.
pub fn push_u256(out: &mut Vec<Felt>, value: Uint256) {
    out.push(Felt::from(value.low));
    out.push(Felt::from(value.high));
}

/// Append a ByteArray as `[data.len(), data..., pending_word,
/// pending_word_len]`.
pub fn push_byte_array(out: &mut Vec<Felt>, bytes: &ByteArray) {
    out.push(Felt::from(bytes.data.len()));
    out.extend_from_slice(&bytes.data);
    out.push(bytes.pending_word);
    out.push(Felt::from(bytes.pending_word_len));
}

/// Sequential reader over a view call's felt response.
pub struct FeltReader<'a> {
    felts: &'a [Felt],
    pos: usize,
}

impl<'a> FeltReader<'a> {
    pub fn new(felts: &'a [Felt]) -> Self {
        Self { felts, pos: 0 }
    }

    pub fn felt(&mut self) -> Result<Felt, SwitchboardError> {
        let value = self.felts.get(self.pos).copied().ok_or_else(|| {
            SwitchboardError::Decode(format!("response truncated at felt {}", self.pos))
        })?;
        self.pos += 1;
        Ok(value)
    }

    pub fn u8(&mut self) -> Result<u8, SwitchboardError> {
        let value = self.u64()?;
        u8::try_from(value)
            .map_err(|_| SwitchboardError::Decode(format!("{value} exceeds u8")))
    }

    pub fn u32(&mut self) -> Result<u32, SwitchboardError> {
        let value = self.u64()?;
        u32::try_from(value)
            .map_err(|_| SwitchboardError::Decode(format!("{value} exceeds u32")))
    }

    pub fn u64(&mut self) -> Result<u64, SwitchboardError> {
        wire::felt_to_u64(&self.felt()?)
    }

    pub fn u128(&mut self) -> Result<u128, SwitchboardError> {
        wire::felt_to_u128(&self.felt()?)
    }

    pub fn i128(&mut self) -> Result<i128, SwitchboardError> {
        wire::felt_to_i128(&self.felt()?)
    }

    pub fn u256(&mut self) -> Result<Uint256, SwitchboardError> {
        let low = self.u128()?;
        let high = self.u128()?;
        Ok(Uint256 { low, high })
    }

    /// Span length prefix.
    pub fn length(&mut self) -> Result<usize, SwitchboardError> {
        Ok(self.u64()? as usize)
    }
}

/// Handle on a deployed contract through a connected account.
///
/// Also used for arbitrary consumer contracts (the example binary submits to
/// its own consumer's `update` entry point through this).
pub struct SwitchboardContract<'a, A> {
    address: Felt,
    account: &'a A,
}

impl<'a, A: ConnectedAccount + Sync> SwitchboardContract<'a, A> {
    pub fn new(address: Felt, account: &'a A) -> Self {
        Self { address, account }
    }

    pub fn address(&self) -> Felt {
        self.address
    }

    pub fn call(&self, selector: Felt, calldata: Vec<Felt>) -> Call {
        Call {
            to: self.address,
            selector,
            calldata,
        }
    }

    /// View call against the pending block.
    pub async fn view(
        &self,
        selector: Felt,
        calldata: Vec<Felt>,
    ) -> Result<Vec<Felt>, SwitchboardError> {
        let result = self
            .account
            .provider()
            .call(
                FunctionCall {
                    contract_address: self.address,
                    entry_point_selector: selector,
                    calldata,
                },
                BlockId::Tag(BlockTag::Pending),
            )
            .await?;
        Ok(result)
    }

    /// Submit calls as a single invoke and block until the receipt is
    /// available. No deadline is enforced here; callers impose their own.
    pub async fn invoke(
        &self,
        operation: &'static str,
        calls: Vec<Call>,
    ) -> Result<Felt, SwitchboardError> {
        let result = self
            .account
            .execute_v3(calls)
            .send()
            .await
            .map_err(|e| SwitchboardError::Account(format!("{operation}: {e}")))?;
        debug!(operation, tx_hash = %format!("{:#x}", result.transaction_hash), "transaction submitted");
        self.wait_for_receipt(operation, result.transaction_hash)
            .await?;
        Ok(result.transaction_hash)
    }

    async fn wait_for_receipt(
        &self,
        operation: &'static str,
        tx_hash: Felt,
    ) -> Result<(), SwitchboardError> {
        loop {
            match self
                .account
                .provider()
                .get_transaction_receipt(tx_hash)
                .await
            {
                Ok(receipt) => {
                    return match receipt.receipt.execution_result() {
                        ExecutionResult::Succeeded => Ok(()),
                        ExecutionResult::Reverted { reason } => {
                            Err(SwitchboardError::TransactionFailed {
                                operation,
                                reason: reason.clone(),
                            })
                        }
                    };
                }
                Err(ProviderError::StarknetError(StarknetError::TransactionHashNotFound)) => {
                    tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
