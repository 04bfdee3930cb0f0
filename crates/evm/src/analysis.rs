//! Bytecode analysis.
//!
//! One forward pass turns raw code into an instruction stream partitioned
//! into basic blocks. Each block is prefixed with a synthetic header entry
//! carrying the block's aggregate static gas and its stack demand, so the
//! interpreter validates gas and stack bounds once per block instead of per
//! instruction. PUSH immediates are decoded here, and the JUMPDEST bitmap
//! is the sole authority on valid jump targets.
//!
//! The analyzer never fails: undefined bytes (including opcodes from later
//! forks) become INVALID, and a PUSH whose data runs off the end of the code
//! is zero-padded.

use crate::opcodes::Opcode;
use bitvec::prelude::*;
use bytes::Bytes;
use kestrel_common::{Fork, H256, U256};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Aggregate metrics of one basic block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockInfo {
    /// Sum of the static gas of every instruction in the block.
    pub gas: u64,
    /// Stack height required on entry so no instruction underflows.
    pub min_stack: u32,
    /// Peak stack growth relative to the entry height.
    pub max_growth: u32,
}

/// Immediate operand attached to an instruction by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    None,
    /// Decoded PUSH1..PUSH32 operand.
    Push(U256),
    /// Static gas of the instructions after this one in its block, already
    /// charged by the block header. GAS and the call/create/SSTORE handlers
    /// add it back to observe true remaining gas.
    GasCorrection(u64),
}

/// One entry of the translated instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Synthetic block entry: charge `gas`, validate stack bounds.
    BlockHeader(BlockInfo),
    Op {
        opcode: Opcode,
        /// Byte offset of the opcode in the original code.
        pc: u32,
        immediate: Immediate,
    },
}

/// The cached result of analyzing one code blob under one fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedCode {
    code: Bytes,
    code_hash: H256,
    instructions: Vec<Instruction>,
    jumpdests: BitVec<u8, Lsb0>,
    /// JUMPDEST byte offset -> stream index of the block header opening at
    /// that offset. Dynamic jumps resolve through this map in O(1).
    jump_entries: FxHashMap<u32, u32>,
}

struct OpenBlock {
    header_index: usize,
    gas: u64,
    delta: i64,
    min_stack: i64,
    max_growth: i64,
    instruction_count: usize,
    /// (stream index, block gas including that instruction) for entries
    /// that need a pre-charge correction once the block total is known.
    corrections: Vec<(usize, u64)>,
}

impl OpenBlock {
    fn open(instructions: &mut Vec<Instruction>) -> Self {
        let header_index = instructions.len();
        instructions.push(Instruction::BlockHeader(BlockInfo::default()));
        Self {
            header_index,
            gas: 0,
            delta: 0,
            min_stack: 0,
            max_growth: 0,
            instruction_count: 0,
            corrections: Vec::new(),
        }
    }

    fn record(&mut self, inputs: u8, outputs: u8, static_gas: u64) {
        let needed = i64::from(inputs).saturating_sub(self.delta);
        if needed > self.min_stack {
            self.min_stack = needed;
        }
        self.delta = self
            .delta
            .saturating_add(i64::from(outputs))
            .saturating_sub(i64::from(inputs));
        if self.delta > self.max_growth {
            self.max_growth = self.delta;
        }
        self.gas = self.gas.saturating_add(static_gas);
    }

    fn close(self, instructions: &mut [Instruction]) {
        let info = BlockInfo {
            gas: self.gas,
            min_stack: u32::try_from(self.min_stack.max(0)).unwrap_or(u32::MAX),
            max_growth: u32::try_from(self.max_growth.max(0)).unwrap_or(u32::MAX),
        };
        if let Some(header) = instructions.get_mut(self.header_index) {
            *header = Instruction::BlockHeader(info);
        }
        for (index, prefix_gas) in self.corrections {
            if let Some(Instruction::Op { immediate, .. }) = instructions.get_mut(index) {
                *immediate = Immediate::GasCorrection(self.gas.saturating_sub(prefix_gas));
            }
        }
    }
}

impl AnalyzedCode {
    pub fn analyze(code: Bytes, fork: Fork) -> Self {
        let code_hash = keccak_hash::keccak(code.as_ref());
        let mut instructions = Vec::with_capacity(code.len().saturating_add(1));
        let mut jumpdests = bitvec![u8, Lsb0; 0; code.len()];
        let mut jump_entries = FxHashMap::default();

        let mut block = OpenBlock::open(&mut instructions);
        let mut pc: usize = 0;
        while pc < code.len() {
            let byte = code.get(pc).copied().unwrap_or(0);
            let opcode = Opcode::from_byte_for_fork(byte, fork).unwrap_or(Opcode::INVALID);

            if opcode == Opcode::JUMPDEST {
                // A JUMPDEST opens a block with itself as first instruction.
                if block.instruction_count > 0 {
                    let finished = std::mem::replace(&mut block, OpenBlock::open(&mut instructions));
                    finished.close(&mut instructions);
                }
                jumpdests.set(pc, true);
                jump_entries.insert(
                    u32::try_from(pc).unwrap_or(u32::MAX),
                    u32::try_from(block.header_index).unwrap_or(u32::MAX),
                );
            }

            let info = opcode.info();
            block.record(info.inputs, info.outputs, info.static_gas);

            let immediate_size = opcode.immediate_size();
            let immediate = if immediate_size > 0 {
                Immediate::Push(decode_push(&code, pc.saturating_add(1), immediate_size))
            } else if opcode.needs_gas_correction() {
                block.corrections.push((instructions.len(), block.gas));
                Immediate::GasCorrection(0)
            } else {
                Immediate::None
            };
            instructions.push(Instruction::Op {
                opcode,
                pc: u32::try_from(pc).unwrap_or(u32::MAX),
                immediate,
            });
            block.instruction_count = block.instruction_count.saturating_add(1);
            pc = pc.saturating_add(1).saturating_add(immediate_size);

            if info.block_end && pc < code.len() {
                let finished = std::mem::replace(&mut block, OpenBlock::open(&mut instructions));
                finished.close(&mut instructions);
            }
        }
        block.close(&mut instructions);

        Self {
            code,
            code_hash,
            instructions,
            jumpdests,
            jump_entries,
        }
    }

    pub fn code(&self) -> &Bytes {
        &self.code
    }

    pub fn code_hash(&self) -> H256 {
        self.code_hash
    }

    pub fn instruction(&self, index: usize) -> Option<Instruction> {
        self.instructions.get(index).copied()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// O(1) bitmap test: is `pc` a JUMPDEST instruction (not PUSH data)?
    pub fn is_jumpdest(&self, pc: usize) -> bool {
        self.jumpdests.get(pc).map(|bit| *bit).unwrap_or(false)
    }

    /// Stream index of the block header at a JUMPDEST offset.
    pub fn jump_entry(&self, pc: usize) -> Option<usize> {
        let pc = u32::try_from(pc).ok()?;
        self.jump_entries
            .get(&pc)
            .map(|index| usize::try_from(*index).unwrap_or(usize::MAX))
    }
}

/// Big-endian decode of PUSH data, zero-padded when the code ends early.
fn decode_push(code: &Bytes, start: usize, size: usize) -> U256 {
    let mut data = [0u8; 32];
    let end = start.saturating_add(size).min(code.len());
    if let Some(available) = code.get(start..end) {
        // Right-pad: a truncated PUSH behaves as if followed by zeros.
        let offset = 32usize.saturating_sub(size);
        if let Some(target) = data.get_mut(offset..offset.saturating_add(available.len())) {
            target.copy_from_slice(available);
        }
    }
    U256::from_big_endian(&data)
}

/// Content-addressed cache of analyzed code, shared across frames.
///
/// Population is idempotent, so racing writers at worst repeat work.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: RwLock<FxHashMap<H256, Arc<AnalyzedCode>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, code: Bytes, fork: Fork) -> Arc<AnalyzedCode> {
        let code_hash = keccak_hash::keccak(code.as_ref());
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(analyzed) = entries.get(&code_hash) {
                return Arc::clone(analyzed);
            }
        }

        let analyzed = Arc::new(AnalyzedCode::analyze(code, fork));
        tracing::debug!(code_hash = ?code_hash, instructions = analyzed.instruction_count(), "analyzed bytecode");
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(entries.entry(code_hash).or_insert(analyzed))
    }
}
