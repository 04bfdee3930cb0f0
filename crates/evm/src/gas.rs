//! Per-frame gas meter.
//!
//! `remaining` is signed: the block pre-charge scheme means a frame can
//! momentarily owe gas while a child call is in flight (the parent's share
//! of the block was charged up-front but the child reservation is computed
//! from true remaining gas). A negative balance that survives the child's
//! return is an out-of-gas halt.

use crate::constants::{REFUND_QUOTIENT_FRONTIER, REFUND_QUOTIENT_LONDON};
use crate::errors::{ExceptionalHalt, InternalError};
use kestrel_common::Fork;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gas {
    limit: u64,
    remaining: i64,
    refunded: i64,
}

impl Gas {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            remaining: i64::try_from(limit).unwrap_or(i64::MAX),
            refunded: 0,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        u64::try_from(self.remaining).unwrap_or(0)
    }

    pub fn used(&self) -> u64 {
        self.limit.saturating_sub(self.remaining())
    }

    pub fn refunded(&self) -> i64 {
        self.refunded
    }

    /// Deduct `amount`, failing without deducting when the balance does not
    /// cover it. The halt path is responsible for zeroing the counter.
    pub fn charge(&mut self, amount: u64) -> Result<(), ExceptionalHalt> {
        let amount = i64::try_from(amount).map_err(|_| ExceptionalHalt::OutOfGas)?;
        let left = self
            .remaining
            .checked_sub(amount)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        if left < 0 {
            return Err(ExceptionalHalt::OutOfGas);
        }
        self.remaining = left;
        Ok(())
    }

    /// True remaining gas at an instruction with a pre-charge correction.
    pub fn corrected_remaining(&self, correction: u64) -> u64 {
        let correction = i64::try_from(correction).unwrap_or(i64::MAX);
        u64::try_from(self.remaining.saturating_add(correction)).unwrap_or(0)
    }

    /// Deduct gas reserved for a child frame. May leave the balance
    /// negative; [`Gas::settle`] decides after the child returns.
    pub fn reserve_for_child(&mut self, amount: u64) -> Result<(), InternalError> {
        let amount = i64::try_from(amount).map_err(|_| InternalError::Overflow)?;
        self.remaining = self
            .remaining
            .checked_sub(amount)
            .ok_or(InternalError::Overflow)?;
        Ok(())
    }

    /// Return a child's unused gas to this meter.
    pub fn erase_cost(&mut self, returned: u64) {
        let returned = i64::try_from(returned).unwrap_or(i64::MAX);
        self.remaining = self.remaining.saturating_add(returned);
    }

    /// Check that no debt is left over after a child call resolved.
    pub fn settle(&self) -> Result<(), ExceptionalHalt> {
        if self.remaining < 0 {
            return Err(ExceptionalHalt::OutOfGas);
        }
        Ok(())
    }

    /// SSTORE refunds may be negative under EIP-3529 re-set rules.
    pub fn record_refund(&mut self, delta: i64) {
        self.refunded = self.refunded.saturating_add(delta);
    }

    /// Absorb a successful child's leftover gas and refund counter.
    pub fn absorb_child(&mut self, child: &Gas) {
        self.erase_cost(child.remaining());
        self.record_refund(child.refunded);
    }

    pub fn consume_all(&mut self) {
        self.remaining = 0;
    }

    /// Final refund, capped at `gas_used / 5` (London+) or `/ 2` before.
    pub fn refund_capped(&self, fork: Fork) -> u64 {
        let quotient = if fork >= Fork::London {
            REFUND_QUOTIENT_LONDON
        } else {
            REFUND_QUOTIENT_FRONTIER
        };
        let refund = u64::try_from(self.refunded).unwrap_or(0);
        refund.min(self.used().checked_div(quotient).unwrap_or(0))
    }
}
