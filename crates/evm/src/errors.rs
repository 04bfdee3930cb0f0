use crate::gas::Gas;
use bytes::Bytes;
use kestrel_common::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol-level reasons a frame stops exceptionally.
///
/// All of these consume the frame's remaining gas and revert its journaled
/// state; the parent observes `0` on the stack and an empty return-data
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum ExceptionalHalt {
    #[error("out of gas")]
    OutOfGas,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("invalid opcode")]
    InvalidOpcode,
    #[error("invalid jump destination")]
    InvalidJump,
    #[error("write attempted in static context")]
    StaticContextViolation,
    #[error("call depth limit exceeded")]
    DepthLimitExceeded,
    #[error("insufficient balance for transfer")]
    BalanceTooLow,
    #[error("deployed code exceeds size cap")]
    CodeSizeExceeded,
    #[error("deployed code starts with reserved 0xEF prefix")]
    InvalidCodePrefix,
    #[error("init code exceeds size cap")]
    InitCodeLimitExceeded,
    #[error("contract address already occupied")]
    CreateCollision,
    #[error("nonce overflow")]
    NonceOverflow,
    #[error("precompile rejected its input")]
    PrecompileFailure,
}

/// Engine-level failures that are not protocol conditions. These abort the
/// whole execution and are surfaced to the engine caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InternalError {
    #[error("memory resources exhausted")]
    OutOfMemory,
    #[error("program counter overflowed")]
    PcOverflow,
    #[error("arithmetic overflow in internal bookkeeping")]
    Overflow,
    #[error("instruction stream corrupted")]
    CorruptedStream,
}

/// Union of the two failure layers, produced by opcode handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VMError {
    #[error(transparent)]
    Halt(#[from] ExceptionalHalt),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// What a single executed instruction asks the interpreter to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    /// Advance to the next instruction in the stream.
    Continue,
    /// Transfer control to the given instruction-stream index.
    Jump(usize),
    /// Orderly end of the frame with empty output.
    Stop,
    /// Orderly end of the frame; output was stored on the frame.
    Return,
    /// Orderly failure; output was stored on the frame, gas is preserved.
    Revert,
    /// SELFDESTRUCT executed; the frame ends successfully with empty output.
    SelfDestruct,
}

/// Terminal status of a frame or of the whole execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxResult {
    Success,
    Revert,
    Halt(ExceptionalHalt),
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TxResult::Success)
    }
}

/// Outcome of running one frame, handed back to the parent (or to the
/// engine entry point for the top frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResult {
    pub result: TxResult,
    pub gas: Gas,
    pub output: Bytes,
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

/// Result of a top-level [`crate::Vm::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub result: TxResult,
    /// `gas_limit - gas_remaining` of the outermost frame.
    pub gas_used: u64,
    /// Accumulated refund, already capped per the fork's refund quotient.
    pub gas_refunded: u64,
    /// Return data; for a successful create, the deployed runtime code.
    pub output: Bytes,
    /// Address of the deployed contract, for create requests.
    pub address_created: Option<Address>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}
