//! Precompiled contract dispatch.
//!
//! The engine owns the address table and the call-path short-circuit; the
//! algorithm bodies are pluggable. Identity and SHA-256 ship built in, the
//! rest (and any L2 extensions) are registered by the embedder via
//! [`Precompiles::register`]. Calling an in-range precompile with no
//! registered body fails the call the way a failed precompile does.

use bytes::Bytes;
use kestrel_common::{Address, Fork};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::gas_cost::word_count;

/// Highest precompile address before Byzantium (ecrecover, SHA-256,
/// RIPEMD-160, identity).
pub const PRECOMPILE_COUNT_FRONTIER: u64 = 4;
/// Byzantium adds modexp, the bn128 trio.
pub const PRECOMPILE_COUNT_BYZANTIUM: u64 = 8;
/// Istanbul adds blake2f.
pub const PRECOMPILE_COUNT_ISTANBUL: u64 = 9;
/// Cancun adds the KZG point-evaluation precompile.
pub const PRECOMPILE_COUNT_CANCUN: u64 = 10;

pub const IDENTITY_BASE_COST: u64 = 15;
pub const IDENTITY_WORD_COST: u64 = 3;
pub const SHA256_BASE_COST: u64 = 60;
pub const SHA256_WORD_COST: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecompileError {
    /// The body's gas cost exceeds the gas given to the call.
    OutOfGas,
    /// The body rejected its input, or no body is registered.
    Failure,
}

/// A precompile body: `(input, gas_limit) -> (output, gas_used)`.
pub type PrecompileFn = fn(&[u8], u64) -> Result<(Bytes, u64), PrecompileError>;

/// The per-fork precompile table.
#[derive(Debug, Clone)]
pub struct Precompiles {
    table: FxHashMap<Address, PrecompileFn>,
    address_count: u64,
}

impl Precompiles {
    pub fn for_fork(fork: Fork) -> Self {
        let address_count = match fork {
            f if f >= Fork::Cancun => PRECOMPILE_COUNT_CANCUN,
            f if f >= Fork::Istanbul => PRECOMPILE_COUNT_ISTANBUL,
            f if f >= Fork::Byzantium => PRECOMPILE_COUNT_BYZANTIUM,
            _ => PRECOMPILE_COUNT_FRONTIER,
        };
        let mut table: FxHashMap<Address, PrecompileFn> = FxHashMap::default();
        table.insert(Address::from_low_u64_be(2), sha256 as PrecompileFn);
        table.insert(Address::from_low_u64_be(4), identity as PrecompileFn);
        Self {
            table,
            address_count,
        }
    }

    /// Install (or replace) a body at `address`. Addresses outside the
    /// fork's canonical range become callable precompiles too, which is how
    /// L2 variants (e.g. an L1-info oracle) are wired in.
    pub fn register(&mut self, address: Address, body: PrecompileFn) {
        self.table.insert(address, body);
    }

    pub fn is_precompile(&self, address: Address) -> bool {
        self.in_canonical_range(address) || self.table.contains_key(&address)
    }

    fn in_canonical_range(&self, address: Address) -> bool {
        let value = kestrel_common::utils::address_to_word(address);
        !value.is_zero() && value <= self.address_count.into()
    }

    /// Addresses warmed at transaction start under EIP-2929.
    pub fn canonical_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        (1..=self.address_count).map(Address::from_low_u64_be)
    }

    pub fn execute(
        &self,
        address: Address,
        input: &[u8],
        gas_limit: u64,
    ) -> Result<(Bytes, u64), PrecompileError> {
        match self.table.get(&address) {
            Some(body) => body(input, gas_limit),
            None => Err(PrecompileError::Failure),
        }
    }
}

/// 0x04: returns its input unchanged.
fn identity(input: &[u8], gas_limit: u64) -> Result<(Bytes, u64), PrecompileError> {
    let cost = IDENTITY_BASE_COST
        .saturating_add(word_count(input.len()).saturating_mul(IDENTITY_WORD_COST));
    if cost > gas_limit {
        return Err(PrecompileError::OutOfGas);
    }
    Ok((Bytes::copy_from_slice(input), cost))
}

/// 0x02: SHA-256 digest of the input.
fn sha256(input: &[u8], gas_limit: u64) -> Result<(Bytes, u64), PrecompileError> {
    let cost =
        SHA256_BASE_COST.saturating_add(word_count(input.len()).saturating_mul(SHA256_WORD_COST));
    if cost > gas_limit {
        return Err(PrecompileError::OutOfGas);
    }
    let digest = Sha256::digest(input);
    Ok((Bytes::copy_from_slice(&digest), cost))
}
