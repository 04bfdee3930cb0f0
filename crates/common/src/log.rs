use crate::{Address, H256};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An event record emitted by a LOG0..LOG4 instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

impl Log {
    pub fn new(address: Address, topics: Vec<H256>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}
