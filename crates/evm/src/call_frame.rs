//! Call frames and the operand stack.

use crate::analysis::AnalyzedCode;
use crate::constants::STACK_LIMIT;
use crate::errors::ExceptionalHalt;
use crate::gas::Gas;
use crate::memory::Memory;
use bytes::Bytes;
use kestrel_common::{Address, U256};
use std::sync::Arc;

/// The 1024-slot LIFO word stack.
///
/// The interpreter validates whole blocks against the analyzer's stack
/// metrics, so the per-operation checks here only fire on unanalyzed paths;
/// they still exist because a violation must be a halt, never UB.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(STACK_LIMIT),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: U256) -> Result<(), ExceptionalHalt> {
        if self.values.len() >= STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<U256, ExceptionalHalt> {
        self.values.pop().ok_or(ExceptionalHalt::StackUnderflow)
    }

    /// Read the value `depth` positions below the top without removing it;
    /// `peek(0)` is the top.
    pub fn peek(&self, depth: usize) -> Result<U256, ExceptionalHalt> {
        let index = self
            .values
            .len()
            .checked_sub(depth.saturating_add(1))
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        self.values
            .get(index)
            .copied()
            .ok_or(ExceptionalHalt::StackUnderflow)
    }

    /// DUPn: push a copy of the value `depth - 1` positions below the top.
    pub fn dup(&mut self, depth: usize) -> Result<(), ExceptionalHalt> {
        let value = self.peek(depth.saturating_sub(1))?;
        self.push(value)
    }

    /// SWAPn: exchange the top with the value `depth` positions below it.
    pub fn swap(&mut self, depth: usize) -> Result<(), ExceptionalHalt> {
        let top = self
            .values
            .len()
            .checked_sub(1)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        let other = top
            .checked_sub(depth)
            .ok_or(ExceptionalHalt::StackUnderflow)?;
        self.values.swap(top, other);
        Ok(())
    }

    /// Top-down snapshot of at most `limit` entries, for tracers.
    pub fn snapshot_top(&self, limit: usize) -> Vec<U256> {
        self.values.iter().rev().take(limit).copied().collect()
    }
}

/// The execution context of one contract call.
///
/// A frame owns its stack, memory, and gas meter exclusively; it is created
/// by the call machinery, mutated only by the interpreter running it, and
/// dropped once its terminal status has been handed to the parent.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub gas: Gas,
    /// Index into the analyzed instruction stream (not a byte offset; the
    /// byte-level PC travels on each instruction).
    pub ip: usize,
    pub code: Arc<AnalyzedCode>,
    /// Account that sent this message.
    pub msg_sender: Address,
    /// Account whose storage and balance this frame acts on.
    pub to: Address,
    /// Account whose code is executing (differs from `to` for CALLCODE and
    /// DELEGATECALL).
    pub code_address: Address,
    pub msg_value: U256,
    pub calldata: Bytes,
    pub stack: Stack,
    pub memory: Memory,
    /// Output of this frame, set by RETURN and REVERT.
    pub output: Bytes,
    /// Output of the most recent completed subcall.
    pub return_data: Bytes,
    pub is_static: bool,
    pub depth: usize,
    pub is_create: bool,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        code: Arc<AnalyzedCode>,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        is_create: bool,
    ) -> Self {
        Self {
            gas: Gas::new(gas_limit),
            ip: 0,
            code,
            msg_sender,
            to,
            code_address,
            msg_value,
            calldata,
            stack: Stack::new(),
            memory: Memory::new(),
            output: Bytes::new(),
            return_data: Bytes::new(),
            is_static,
            depth,
            is_create,
        }
    }
}
