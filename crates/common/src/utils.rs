use crate::{Address, H256, U256};

/// Truncate a 256-bit word to its low 160 bits, as CALL-family operands do.
pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_big_endian();
    Address::from_slice(&bytes[12..])
}

/// Left-zero-pad an address into a 256-bit word.
pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

pub fn word_to_h256(word: U256) -> H256 {
    H256(word.to_big_endian())
}

pub fn h256_to_word(hash: H256) -> U256 {
    U256::from_big_endian(hash.as_bytes())
}
