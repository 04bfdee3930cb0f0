//! Address derivation and small shared helpers.

use keccak_hash::keccak;
use kestrel_common::{Address, H256, U256};

/// CREATE address: `keccak(rlp([sender, nonce]))[12..]`.
///
/// The encoding is the fixed two-item RLP list, inlined: a 20-byte string
/// and a scalar.
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
pub fn create_address(sender: Address, nonce: u64) -> Address {
    let mut payload: Vec<u8> = Vec::with_capacity(30);
    payload.push(0x80 + 20);
    payload.extend_from_slice(sender.as_bytes());
    if nonce == 0 {
        payload.push(0x80);
    } else if nonce < 0x80 {
        payload.push(u8::try_from(nonce).unwrap_or(0x7F));
    } else {
        let be = nonce.to_be_bytes();
        let first = be.iter().position(|byte| *byte != 0).unwrap_or(7);
        let scalar = &be[first..];
        payload.push(0x80 + u8::try_from(scalar.len()).unwrap_or(8));
        payload.extend_from_slice(scalar);
    }

    let mut encoded = Vec::with_capacity(payload.len() + 1);
    encoded.push(0xC0 + u8::try_from(payload.len()).unwrap_or(0));
    encoded.extend_from_slice(&payload);

    Address::from_slice(&keccak(&encoded).as_bytes()[12..])
}

/// CREATE2 address: `keccak(0xff ++ sender ++ salt ++ keccak(init_code))[12..]`.
#[allow(clippy::indexing_slicing)]
pub fn create2_address(sender: Address, salt: U256, init_code_hash: H256) -> Address {
    let mut preimage = Vec::with_capacity(85);
    preimage.push(0xFF);
    preimage.extend_from_slice(sender.as_bytes());
    preimage.extend_from_slice(&salt.to_big_endian());
    preimage.extend_from_slice(init_code_hash.as_bytes());
    Address::from_slice(&keccak(&preimage).as_bytes()[12..])
}
