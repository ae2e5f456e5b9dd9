//! Client SDK for the Switchboard oracle contract on Starknet.
//!
//! Three layers:
//!
//! - [`wire`] and [`update`]: pure encoding between native values and the
//!   contract's Cairo calldata formats, and assembly of signed oracle
//!   responses into submittable update records.
//! - [`contract`], [`gateway`]: the external surfaces — explicit calldata
//!   marshalling against the deployed contract, and HTTP clients for the
//!   oracle gateway and crossbar.
//! - [`client`], [`aggregator`], [`queue`], [`randomness`]: the typed API.
//!   Build a [`client::SwitchboardClient`] from a connected account, then
//!   work through the wrappers.
//!
//! The usual flow for keeping a feed fresh is
//! [`aggregator::Aggregator::fetch_update`] (crossbar jobs → gateway
//! signatures → update records) followed by submission, either through
//! [`aggregator::Aggregator::submit_update`] or by forwarding the records to
//! a consumer contract as the `feed_update` binary does.

pub mod aggregator;
pub mod client;
pub mod contract;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod randomness;
pub mod update;
pub mod wire;

use starknet::core::chain_id;
use starknet::core::types::Felt;
use starknet::macros::felt;

use crate::wire::Uint256;

/// A Switchboard deployment: chain id, contract address, well-known queue
/// ids and the default gateway URL.
#[derive(Clone, Debug)]
pub struct Chain {
    chain_id: Felt,
    switchboard: Felt,
    oracle_queue: Uint256,
    guardian_queue: Uint256,
    default_gateway: String,
}

impl Chain {
    pub fn mainnet() -> Self {
        Self {
            chain_id: chain_id::MAINNET,
            switchboard: felt!(
                "0x068cc3c8e1d1ae4683ee7844454a11bc32ae0aa6188f268d73f7fff8004be68d"
            ),
            oracle_queue: Uint256 {
                low: 0x386204ea9d6c8b04743ac2ef010b0752,
                high: 0x86807068432f186a147cf0b13a30067d,
            },
            guardian_queue: Uint256 {
                low: 0xa9395b754b3242a3ad2d28bcf04be6fe,
                high: 0x78d5b862f20f5a4457ecea7962caa836,
            },
            default_gateway: "https://mainnet-gateway.switchboard.xyz".to_string(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            chain_id: chain_id::SEPOLIA,
            switchboard: felt!(
                "0x02d880dd4a1fb6f61fc13b1ea767187b9b85f97460a2997abb537fb100cbc439"
            ),
            oracle_queue: Uint256 {
                low: 0xf95555deeae498c3a2f8b3ee670287d1,
                high: 0xd9cd6a04191d6cd559a5276e69a79cc6,
            },
            guardian_queue: Uint256 {
                low: 0x37063d290f9df6e7c63f3f15ac7e511e,
                high: 0x3806b836b2f22ebd3a765acd54d6bb3b,
            },
            default_gateway: "https://testnet-gateway.switchboard.xyz".to_string(),
        }
    }

    pub fn custom(
        chain_id: Felt,
        switchboard: Felt,
        oracle_queue: Uint256,
        guardian_queue: Uint256,
        default_gateway: String,
    ) -> Self {
        Self {
            chain_id,
            switchboard,
            oracle_queue,
            guardian_queue,
            default_gateway,
        }
    }

    pub fn chain_id(&self) -> Felt {
        self.chain_id
    }

    pub fn switchboard(&self) -> Felt {
        self.switchboard
    }

    pub fn oracle_queue(&self) -> Uint256 {
        self.oracle_queue
    }

    pub fn guardian_queue(&self) -> Uint256 {
        self.guardian_queue
    }

    pub fn default_gateway(&self) -> &str {
        &self.default_gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_networks_are_distinct() {
        let mainnet = Chain::mainnet();
        let testnet = Chain::testnet();
        assert_ne!(mainnet.chain_id(), testnet.chain_id());
        assert_ne!(mainnet.switchboard(), testnet.switchboard());
        assert_ne!(mainnet.oracle_queue(), testnet.oracle_queue());
        assert_ne!(mainnet.default_gateway(), testnet.default_gateway());
    }

    #[test]
    fn test_mainnet_queue_id_limbs() {
        assert_eq!(
            Chain::mainnet().oracle_queue().to_hex(),
            "86807068432f186a147cf0b13a30067d386204ea9d6c8b04743ac2ef010b0752"
        );
    }
}
