use crate::{H256, U256};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// In-memory view of an account's mutable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
}

impl Account {
    pub fn new(balance: U256, nonce: u64, code: Bytes) -> Self {
        Self {
            balance,
            nonce,
            code,
        }
    }

    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    pub fn with_code(code: Bytes) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }

    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    /// Empty per EIP-161: no code, zero nonce, zero balance.
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code.is_empty()
    }

    pub fn code_hash(&self) -> H256 {
        keccak_hash::keccak(self.code.as_ref())
    }
}
