//! Dynamic gas costs of the EVM instructions.
//!
//! Static per-opcode gas lives in the [`crate::opcodes`] metadata table and
//! is aggregated per basic block by the analyzer. Everything here depends on
//! runtime state: touched memory, access-list temperature, storage slot
//! history, operand sizes, or the active fork.

use crate::constants::{CALL_STIPEND, GAS_RETENTION_DIVISOR, WORD_SIZE};
use crate::errors::ExceptionalHalt;
use kestrel_common::{Fork, U256};

pub const EXP_BYTE_COST_FRONTIER: u64 = 10;
pub const EXP_BYTE_COST_SPURIOUS_DRAGON: u64 = 50;
pub const KECCAK_WORD_COST: u64 = 6;
pub const COPY_WORD_COST: u64 = 3;
pub const LOG_TOPIC_COST: u64 = 375;
pub const LOG_DATA_BYTE_COST: u64 = 8;
pub const MEMORY_WORD_COST: u64 = 3;
pub const MEMORY_QUADRATIC_DENOMINATOR: u64 = 512;

pub const COLD_ADDRESS_ACCESS_COST: u64 = 2600;
pub const COLD_SLOAD_COST: u64 = 2100;
pub const WARM_ACCESS_COST: u64 = 100;

pub const SSTORE_SET_COST: u64 = 20000;
pub const SSTORE_RESET_COST: u64 = 5000;
pub const SSTORE_CLEAR_REFUND_FRONTIER: i64 = 15000;
pub const SSTORE_CLEAR_REFUND_LONDON: i64 = 4800;

pub const CALL_BASE_COST_FRONTIER: u64 = 40;
pub const CALL_BASE_COST_TANGERINE: u64 = 700;
pub const CALL_VALUE_COST: u64 = 9000;
pub const NEW_ACCOUNT_COST: u64 = 25000;

pub const SELFDESTRUCT_BASE_COST_TANGERINE: u64 = 5000;
pub const SELFDESTRUCT_REFUND: i64 = 24000;

pub const INIT_CODE_WORD_COST: u64 = 2;
pub const CREATE2_HASH_WORD_COST: u64 = 6;

/// Number of 32-byte words covering `size` bytes.
pub fn word_count(size: usize) -> u64 {
    let size = u64::try_from(size).unwrap_or(u64::MAX);
    size.div_ceil(u64::try_from(WORD_SIZE).unwrap_or(32))
}

fn memory_cost(size: usize) -> u128 {
    let words = u128::from(word_count(size));
    let linear = words.saturating_mul(u128::from(MEMORY_WORD_COST));
    let quadratic = words
        .saturating_mul(words)
        .checked_div(u128::from(MEMORY_QUADRATIC_DENOMINATOR))
        .unwrap_or(0);
    linear.saturating_add(quadratic)
}

/// Charge for growing memory from `current_size` to `new_size`, both in
/// bytes. Zero when the touched region is already in bounds.
pub fn memory_expansion_cost(new_size: usize, current_size: usize) -> u64 {
    if new_size <= current_size {
        return 0;
    }
    let delta = memory_cost(new_size).saturating_sub(memory_cost(current_size));
    u64::try_from(delta).unwrap_or(u64::MAX)
}

/// Dynamic part of EXP: per-byte cost of the exponent's minimal encoding.
pub fn exp_cost(exponent: U256, fork: Fork) -> u64 {
    let byte_size = u64::try_from(exponent.bits().saturating_add(7).checked_div(8).unwrap_or(0))
        .unwrap_or(u64::MAX);
    let per_byte = if fork >= Fork::SpuriousDragon {
        EXP_BYTE_COST_SPURIOUS_DRAGON
    } else {
        EXP_BYTE_COST_FRONTIER
    };
    byte_size.saturating_mul(per_byte)
}

/// Dynamic part of the *COPY family: 3 per copied word.
pub fn copy_cost(size: usize) -> u64 {
    word_count(size).saturating_mul(COPY_WORD_COST)
}

/// Dynamic part of KECCAK256: 6 per hashed word.
pub fn keccak_cost(size: usize) -> u64 {
    word_count(size).saturating_mul(KECCAK_WORD_COST)
}

/// Dynamic part of LOGn: per-topic and per-byte charges.
pub fn log_cost(topic_count: usize, size: usize) -> u64 {
    let topics = u64::try_from(topic_count).unwrap_or(u64::MAX);
    let bytes = u64::try_from(size).unwrap_or(u64::MAX);
    topics
        .saturating_mul(LOG_TOPIC_COST)
        .saturating_add(bytes.saturating_mul(LOG_DATA_BYTE_COST))
}

fn warm_cold_cost(is_cold: bool) -> u64 {
    if is_cold {
        COLD_ADDRESS_ACCESS_COST
    } else {
        WARM_ACCESS_COST
    }
}

pub fn balance_cost(fork: Fork, is_cold: bool) -> u64 {
    match fork {
        f if f >= Fork::Berlin => warm_cold_cost(is_cold),
        f if f >= Fork::Istanbul => 700,
        f if f >= Fork::TangerineWhistle => 400,
        _ => 20,
    }
}

pub fn extcodesize_cost(fork: Fork, is_cold: bool) -> u64 {
    match fork {
        f if f >= Fork::Berlin => warm_cold_cost(is_cold),
        f if f >= Fork::TangerineWhistle => 700,
        _ => 20,
    }
}

/// Base (non-copy) part of EXTCODECOPY.
pub fn extcodecopy_base_cost(fork: Fork, is_cold: bool) -> u64 {
    extcodesize_cost(fork, is_cold)
}

pub fn extcodehash_cost(fork: Fork, is_cold: bool) -> u64 {
    match fork {
        f if f >= Fork::Berlin => warm_cold_cost(is_cold),
        f if f >= Fork::Istanbul => 700,
        _ => 400,
    }
}

pub fn sload_cost(fork: Fork, is_cold: bool) -> u64 {
    match fork {
        f if f >= Fork::Berlin => {
            if is_cold {
                COLD_SLOAD_COST
            } else {
                WARM_ACCESS_COST
            }
        }
        f if f >= Fork::Istanbul => 800,
        f if f >= Fork::TangerineWhistle => 200,
        _ => 50,
    }
}

/// SSTORE cost and refund delta.
///
/// `gas_left` must be the frame's true remaining gas (pre-charge corrected):
/// EIP-2200 aborts the write when 2300 gas or less remains.
pub fn sstore_cost(
    fork: Fork,
    is_cold: bool,
    original: U256,
    current: U256,
    new: U256,
    gas_left: u64,
) -> Result<(u64, i64), ExceptionalHalt> {
    if fork >= Fork::Istanbul && gas_left <= crate::constants::SSTORE_SENTRY {
        return Err(ExceptionalHalt::OutOfGas);
    }

    if fork < Fork::Istanbul {
        // Pre-net-metering schedule.
        let cost = if current.is_zero() && !new.is_zero() {
            SSTORE_SET_COST
        } else {
            SSTORE_RESET_COST
        };
        let refund = if !current.is_zero() && new.is_zero() {
            SSTORE_CLEAR_REFUND_FRONTIER
        } else {
            0
        };
        return Ok((cost, refund));
    }

    // EIP-2200 net metering, with EIP-2929 warm/cold (Berlin) and EIP-3529
    // refund amounts (London).
    let (reset_cost, warm_base) = if fork >= Fork::Berlin {
        (SSTORE_RESET_COST.saturating_sub(COLD_SLOAD_COST), WARM_ACCESS_COST)
    } else {
        (SSTORE_RESET_COST, 800)
    };
    let clear_refund = if fork >= Fork::London {
        SSTORE_CLEAR_REFUND_LONDON
    } else {
        SSTORE_CLEAR_REFUND_FRONTIER
    };

    let mut cost = if original == current && current != new {
        if original.is_zero() {
            SSTORE_SET_COST
        } else {
            reset_cost
        }
    } else {
        warm_base
    };
    if fork >= Fork::Berlin && is_cold {
        cost = cost.saturating_add(COLD_SLOAD_COST);
    }

    let mut refund: i64 = 0;
    if current != new {
        if original == current {
            if !original.is_zero() && new.is_zero() {
                refund = refund.saturating_add(clear_refund);
            }
        } else {
            if !original.is_zero() {
                if current.is_zero() {
                    refund = refund.saturating_sub(clear_refund);
                }
                if new.is_zero() {
                    refund = refund.saturating_add(clear_refund);
                }
            }
            if original == new {
                let restore_refund = if original.is_zero() {
                    i64::try_from(SSTORE_SET_COST.saturating_sub(warm_base)).unwrap_or(i64::MAX)
                } else {
                    i64::try_from(reset_cost.saturating_sub(warm_base)).unwrap_or(i64::MAX)
                };
                refund = refund.saturating_add(restore_refund);
            }
        }
    }

    Ok((cost, refund))
}

/// All but one 64th, the EIP-150 retention rule.
pub fn max_gas_for_child(gas_left: u64) -> u64 {
    gas_left.saturating_sub(gas_left.checked_div(GAS_RETENTION_DIVISOR).unwrap_or(0))
}

/// Combined cost of a CALL-family opcode and the gas limit handed to the
/// child frame (stipend included).
///
/// `gas_left` is the frame's true remaining gas at the opcode; the returned
/// cost covers base + transfer + new-account + memory expansion + the child
/// reservation (without the stipend, which the parent never pays for).
#[allow(clippy::too_many_arguments)]
pub fn call_cost(
    fork: Fork,
    address_is_cold: bool,
    value: U256,
    callee_exists: bool,
    callee_is_empty: bool,
    charge_new_account: bool,
    gas_requested: U256,
    gas_left: u64,
    memory_expansion: u64,
) -> Result<(u64, u64), ExceptionalHalt> {
    let base = match fork {
        f if f >= Fork::Berlin => warm_cold_cost(address_is_cold),
        f if f >= Fork::TangerineWhistle => CALL_BASE_COST_TANGERINE,
        _ => CALL_BASE_COST_FRONTIER,
    };

    let transfer_cost = if value.is_zero() { 0 } else { CALL_VALUE_COST };

    let new_account_cost = if charge_new_account {
        let charge = if fork >= Fork::SpuriousDragon {
            !value.is_zero() && (!callee_exists || callee_is_empty)
        } else {
            !callee_exists
        };
        if charge { NEW_ACCOUNT_COST } else { 0 }
    } else {
        0
    };

    let upfront = base
        .saturating_add(transfer_cost)
        .saturating_add(new_account_cost)
        .saturating_add(memory_expansion);

    let after_upfront = gas_left
        .checked_sub(upfront)
        .ok_or(ExceptionalHalt::OutOfGas)?;

    let requested = u64::try_from(gas_requested).unwrap_or(u64::MAX);
    let child_gas = if fork >= Fork::TangerineWhistle {
        requested.min(max_gas_for_child(after_upfront))
    } else {
        if requested > after_upfront {
            return Err(ExceptionalHalt::OutOfGas);
        }
        requested
    };

    let total = upfront.saturating_add(child_gas);
    let child_limit = if value.is_zero() {
        child_gas
    } else {
        child_gas.saturating_add(CALL_STIPEND)
    };

    Ok((total, child_limit))
}

/// EIP-3860 init-code metering plus the CREATE2 hashing charge.
pub fn create_cost(
    fork: Fork,
    init_code_size: usize,
    is_create2: bool,
    memory_expansion: u64,
) -> u64 {
    let words = word_count(init_code_size);
    let mut cost = memory_expansion;
    if fork >= Fork::Shanghai {
        cost = cost.saturating_add(words.saturating_mul(INIT_CODE_WORD_COST));
    }
    if is_create2 {
        cost = cost.saturating_add(words.saturating_mul(CREATE2_HASH_WORD_COST));
    }
    cost
}

/// SELFDESTRUCT cost and refund.
pub fn selfdestruct_cost(
    fork: Fork,
    beneficiary_is_cold: bool,
    beneficiary_exists: bool,
    beneficiary_is_empty: bool,
    balance: U256,
    first_destruction: bool,
) -> (u64, i64) {
    let mut cost = if fork >= Fork::TangerineWhistle {
        SELFDESTRUCT_BASE_COST_TANGERINE
    } else {
        0
    };

    let new_account = if fork >= Fork::SpuriousDragon {
        !balance.is_zero() && (!beneficiary_exists || beneficiary_is_empty)
    } else if fork >= Fork::TangerineWhistle {
        !beneficiary_exists
    } else {
        false
    };
    if new_account {
        cost = cost.saturating_add(NEW_ACCOUNT_COST);
    }

    if fork >= Fork::Berlin && beneficiary_is_cold {
        cost = cost.saturating_add(COLD_ADDRESS_ACCESS_COST);
    }

    let refund = if fork < Fork::London && first_destruction {
        SELFDESTRUCT_REFUND
    } else {
        0
    };

    (cost, refund)
}
