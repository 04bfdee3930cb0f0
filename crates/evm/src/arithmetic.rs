//! 256-bit arithmetic with EVM semantics.
//!
//! All operations are total: division by zero yields zero, overflow wraps
//! modulo 2^256, and the signed operations reinterpret bit patterns as
//! two's complement. Handlers call these and never fail internally.

use kestrel_common::{U256, U512};

const SIGN_BIT: usize = 255;

pub fn is_negative(value: U256) -> bool {
    value.bit(SIGN_BIT)
}

/// Two's-complement negation modulo 2^256.
pub fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

pub fn div(a: U256, b: U256) -> U256 {
    a.checked_div(b).unwrap_or_default()
}

pub fn sdiv(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_negative = is_negative(a);
    let b_negative = is_negative(b);
    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if b_negative { twos_complement(b) } else { b };
    // INT_MIN / -1 falls out of the wrap: |INT_MIN| / 1 re-wraps to INT_MIN.
    let quotient = a_abs.checked_div(b_abs).unwrap_or_default();
    if a_negative != b_negative {
        twos_complement(quotient)
    } else {
        quotient
    }
}

pub fn rem(a: U256, b: U256) -> U256 {
    a.checked_rem(b).unwrap_or_default()
}

/// Signed remainder; the result takes the dividend's sign.
pub fn srem(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_negative = is_negative(a);
    let a_abs = if a_negative { twos_complement(a) } else { a };
    let b_abs = if is_negative(b) { twos_complement(b) } else { b };
    let remainder = a_abs.checked_rem(b_abs).unwrap_or_default();
    if a_negative {
        twos_complement(remainder)
    } else {
        remainder
    }
}

/// `(a + b) % n` computed in 512-bit space.
pub fn addmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let sum = U512::from(a)
        .checked_add(U512::from(b))
        .unwrap_or_default();
    let reduced = sum.checked_rem(U512::from(n)).unwrap_or_default();
    U256::try_from(reduced).unwrap_or_default()
}

/// `(a * b) % n` computed in 512-bit space.
pub fn mulmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let product = a.full_mul(b);
    let reduced = product.checked_rem(U512::from(n)).unwrap_or_default();
    U256::try_from(reduced).unwrap_or_default()
}

/// `base ** exponent` modulo 2^256.
pub fn exp(base: U256, exponent: U256) -> U256 {
    base.overflowing_pow(exponent).0
}

/// Sign-extend `value` from the byte at index `byte_index` (0 = least
/// significant). Indices of 31 and above leave the value unchanged.
pub fn signextend(byte_index: U256, value: U256) -> U256 {
    if byte_index >= U256::from(31) {
        return value;
    }
    let index = byte_index.low_u64();
    let sign_bit = index
        .saturating_mul(8)
        .saturating_add(7)
        .min(255);
    let sign_bit = usize::try_from(sign_bit).unwrap_or(255);
    let mask = (U256::one() << sign_bit.saturating_add(1)).overflowing_sub(U256::one()).0;
    if value.bit(sign_bit) {
        value | !mask
    } else {
        value & mask
    }
}

pub fn slt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

pub fn sgt(a: U256, b: U256) -> bool {
    slt(b, a)
}

/// Big-endian byte extraction: index 0 is the most significant byte.
pub fn byte(index: U256, value: U256) -> U256 {
    if index >= U256::from(32) {
        return U256::zero();
    }
    let index = usize::try_from(index.low_u64()).unwrap_or(31).min(31);
    let bytes = value.to_big_endian();
    U256::from(bytes.get(index).copied().unwrap_or(0))
}

pub fn shl(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value << usize::try_from(shift.low_u64()).unwrap_or(255).min(255)
    }
}

pub fn shr(shift: U256, value: U256) -> U256 {
    if shift >= U256::from(256) {
        U256::zero()
    } else {
        value >> usize::try_from(shift.low_u64()).unwrap_or(255).min(255)
    }
}

/// Arithmetic right shift: shifted-in bits copy the sign.
pub fn sar(shift: U256, value: U256) -> U256 {
    let negative = is_negative(value);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = usize::try_from(shift.low_u64()).unwrap_or(255).min(255);
    let shifted = value >> shift;
    if negative && shift > 0 {
        // Fill the vacated high bits with ones.
        let fill = U256::MAX << usize::saturating_sub(256, shift).min(255);
        shifted | fill
    } else {
        shifted
    }
}
