//! Read-only block and transaction context.

use kestrel_common::{Address, Fork, H256, U256};
use serde::{Deserialize, Serialize};

/// Everything the environment-reader opcodes can observe. Assembled by the
/// caller from the block header and transaction; the engine never mutates
/// it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub fork: Fork,
    /// Transaction sender (ORIGIN).
    pub origin: Address,
    /// Effective gas price of the transaction (GASPRICE).
    pub gas_price: U256,
    pub chain_id: U256,
    pub block_number: U256,
    pub timestamp: U256,
    pub coinbase: Address,
    /// PREVRANDAO payload from the Paris fork onward.
    pub prev_randao: H256,
    /// Block difficulty, served by the same opcode before Paris.
    pub difficulty: U256,
    pub block_gas_limit: u64,
    pub base_fee_per_gas: U256,
    /// Versioned hashes of the transaction's blobs (BLOBHASH).
    pub blob_hashes: Vec<H256>,
    pub blob_base_fee: U256,
}

impl Environment {
    pub fn for_fork(fork: Fork) -> Self {
        Self {
            fork,
            ..Default::default()
        }
    }
}
