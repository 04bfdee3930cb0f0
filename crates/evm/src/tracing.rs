//! Step-level execution tracing.
//!
//! A [`Tracer`] sees every instruction boundary and every frame
//! termination. All snapshots handed to it are bounded copies — the tracer
//! can hold on to them freely, and the engine does no snapshot work at all
//! when no tracer is installed.

use crate::errors::{ExceptionalHalt, TxResult};
use bytes::Bytes;
use kestrel_common::{Address, Log, U256};

/// Caps applied to the per-step stack and memory copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCaps {
    pub max_stack_items: usize,
    pub max_memory_bytes: usize,
}

impl Default for SnapshotCaps {
    fn default() -> Self {
        Self {
            max_stack_items: 32,
            max_memory_bytes: 1024,
        }
    }
}

/// State observed immediately before an instruction executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    pub pc: usize,
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub gas_remaining: u64,
    pub depth: usize,
    pub stack_size: usize,
    pub memory_size: usize,
    /// Account whose storage the instruction acts on.
    pub address: Address,
}

/// A storage write observed by the tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageChange {
    pub key: U256,
    pub previous: U256,
    pub new: U256,
}

/// Effects observed immediately after an instruction executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub gas_cost: u64,
    /// Top of the stack after the step, newest first, truncated to the cap.
    pub stack: Vec<U256>,
    pub stack_truncated: bool,
    /// Memory prefix after the step, truncated to the cap.
    pub memory: Vec<u8>,
    pub memory_truncated: bool,
    pub storage_change: Option<StorageChange>,
    pub log_emitted: Option<Log>,
    pub error: Option<ExceptionalHalt>,
}

/// Terminal record of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    pub depth: usize,
    pub gas_used: u64,
    pub failed: bool,
    pub return_data: Bytes,
    pub result: TxResult,
}

pub trait Tracer {
    /// Snapshot limits for this tracer. Consulted once per step.
    fn caps(&self) -> SnapshotCaps {
        SnapshotCaps::default()
    }

    fn pre_step(&mut self, info: &StepInfo);
    fn post_step(&mut self, result: &StepResult);
    fn finalize(&mut self, outcome: &FrameOutcome);
}

/// A tracer that records everything it sees, for debugging sessions and
/// test assertions.
#[derive(Debug, Default)]
pub struct CollectingTracer {
    pub caps: SnapshotCaps,
    pub steps: Vec<StepInfo>,
    pub results: Vec<StepResult>,
    pub outcomes: Vec<FrameOutcome>,
}

impl CollectingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caps(caps: SnapshotCaps) -> Self {
        Self {
            caps,
            ..Default::default()
        }
    }
}

impl Tracer for CollectingTracer {
    fn caps(&self) -> SnapshotCaps {
        self.caps
    }

    fn pre_step(&mut self, info: &StepInfo) {
        self.steps.push(info.clone());
    }

    fn post_step(&mut self, result: &StepResult) {
        self.results.push(result.clone());
    }

    fn finalize(&mut self, outcome: &FrameOutcome) {
        self.outcomes.push(outcome.clone());
    }
}
