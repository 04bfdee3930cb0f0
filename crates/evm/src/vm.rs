//! The interpreter core and the engine entry point.
//!
//! [`Vm::execute`] takes a call request and drives it to a terminal status.
//! Frames run in [`Vm::run_frame`]: a loop over the analyzed instruction
//! stream in which every basic block is entered through its synthetic
//! header (aggregate gas charge + stack validation) and individual
//! instructions dispatch through a single match. Nested calls recurse
//! through the handlers in `opcode_handlers::system`.

use crate::{
    analysis::{AnalysisCache, BlockInfo, Immediate, Instruction},
    call_frame::CallFrame,
    constants::{CODE_DEPOSIT_COST_PER_BYTE, EOF_PREFIX, MAX_CODE_SIZE, MAX_INITCODE_SIZE, STACK_LIMIT},
    environment::Environment,
    errors::{
        ContextResult, ExceptionalHalt, ExecutionReport, InternalError, OpcodeResult, TxResult,
        VMError,
    },
    gas::Gas,
    host::Host,
    opcodes::Opcode,
    precompiles::{PrecompileError, Precompiles},
    tracing::{FrameOutcome, StepInfo, StepResult, Tracer},
    utils::{create2_address, create_address},
};
use bytes::Bytes;
use kestrel_common::{Address, Fork, U256};

/// Flavor of a top-level request or nested message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallKind {
    #[default]
    Transaction,
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    Create,
    Create2,
}

/// A top-level execution request.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub kind: CallKind,
    pub caller: Address,
    pub callee: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    /// Code to execute; for create kinds this is the init code. `None`
    /// loads the code at `callee` from the host.
    pub code: Option<Bytes>,
    pub is_static: bool,
    /// CREATE2 only.
    pub salt: U256,
}

impl CallRequest {
    pub fn transaction(caller: Address, callee: Address, gas_limit: u64, input: Bytes) -> Self {
        Self {
            kind: CallKind::Transaction,
            caller,
            callee,
            gas_limit,
            input,
            ..Default::default()
        }
    }

    pub fn create(caller: Address, gas_limit: u64, init_code: Bytes) -> Self {
        Self {
            kind: CallKind::Create,
            caller,
            gas_limit,
            code: Some(init_code),
            ..Default::default()
        }
    }

    pub fn create2(caller: Address, gas_limit: u64, init_code: Bytes, salt: U256) -> Self {
        Self {
            kind: CallKind::Create2,
            caller,
            gas_limit,
            code: Some(init_code),
            salt,
            ..Default::default()
        }
    }
}

/// Per-step effects gathered for the tracer. Empty unless one is installed.
#[derive(Debug, Default)]
pub(crate) struct StepEffects {
    pub storage_change: Option<crate::tracing::StorageChange>,
    pub log_emitted: Option<kestrel_common::Log>,
}

/// The execution engine. One instance serves one hardfork; the analyzed
/// code cache lives for the life of the instance.
pub struct Vm<'a, H: Host> {
    pub host: &'a mut H,
    pub env: Environment,
    pub tracer: Option<Box<dyn Tracer>>,
    pub(crate) analysis: AnalysisCache,
    pub(crate) precompiles: Precompiles,
    pub(crate) step_effects: StepEffects,
    /// Soft instruction budget; exceeding it raises out-of-gas at the next
    /// block header.
    instruction_budget: Option<u64>,
    instructions_executed: u64,
}

impl<'a, H: Host> Vm<'a, H> {
    pub fn new(env: Environment, host: &'a mut H) -> Self {
        let precompiles = Precompiles::for_fork(env.fork);
        Self {
            host,
            env,
            tracer: None,
            analysis: AnalysisCache::new(),
            precompiles,
            step_effects: StepEffects::default(),
            instruction_budget: None,
            instructions_executed: 0,
        }
    }

    pub fn with_tracer(mut self, tracer: Box<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Replace the precompile table (after registering extra entries).
    pub fn with_precompiles(mut self, precompiles: Precompiles) -> Self {
        self.precompiles = precompiles;
        self
    }

    pub fn set_instruction_budget(&mut self, budget: u64) {
        self.instruction_budget = Some(budget);
    }

    /// Run a request to completion and report the outcome.
    pub fn execute(&mut self, request: CallRequest) -> Result<ExecutionReport, InternalError> {
        let fork = self.env.fork;
        self.warm_transaction_scope(&request);

        let (ctx, address_created) = match request.kind {
            CallKind::Create | CallKind::Create2 => self.execute_create_request(request)?,
            _ => self.execute_call_request(request)?,
        };

        let gas_refunded = if ctx.result.is_success() {
            ctx.gas.refund_capped(fork)
        } else {
            0
        };
        let report = ExecutionReport {
            result: ctx.result,
            gas_used: ctx.gas.used(),
            gas_refunded,
            output: ctx.output,
            address_created,
        };
        tracing::debug!(
            result = ?report.result,
            gas_used = report.gas_used,
            gas_refunded = report.gas_refunded,
            "execution finished"
        );
        Ok(report)
    }

    /// Seed the EIP-2929 warm sets: origin, target, precompiles, and the
    /// coinbase from Shanghai (EIP-3651).
    fn warm_transaction_scope(&mut self, request: &CallRequest) {
        self.host.access_address(self.env.origin);
        self.host.access_address(request.caller);
        if !matches!(request.kind, CallKind::Create | CallKind::Create2) {
            self.host.access_address(request.callee);
        }
        if self.env.fork >= Fork::Shanghai {
            self.host.access_address(self.env.coinbase);
        }
        let precompile_addresses: Vec<Address> =
            self.precompiles.canonical_addresses().collect();
        for address in precompile_addresses {
            self.host.access_address(address);
        }
    }

    fn execute_call_request(
        &mut self,
        request: CallRequest,
    ) -> Result<(ContextResult, Option<Address>), InternalError> {
        let is_static = request.is_static || request.kind == CallKind::StaticCall;
        // CALLCODE and DELEGATECALL at the top level act on the caller's
        // account while running the callee's code.
        let (msg_sender, to, code_address, transfers_value) = match request.kind {
            CallKind::CallCode => (request.caller, request.caller, request.callee, false),
            CallKind::DelegateCall => (request.caller, request.caller, request.callee, false),
            _ => (request.caller, request.callee, request.callee, true),
        };

        if transfers_value
            && !request.value.is_zero()
            && self.host.balance(request.caller) < request.value
        {
            let mut gas = Gas::new(request.gas_limit);
            gas.consume_all();
            let ctx = ContextResult {
                result: TxResult::Halt(ExceptionalHalt::BalanceTooLow),
                gas,
                output: Bytes::new(),
            };
            return Ok((ctx, None));
        }

        let snapshot = self.host.snapshot();
        if transfers_value && !request.value.is_zero() {
            self.host.transfer(request.caller, to, request.value);
        }

        let ctx = match request.code {
            Some(code) => {
                let analyzed = self.analysis.analyze(code, self.env.fork);
                let mut frame = CallFrame::new(
                    msg_sender,
                    to,
                    code_address,
                    analyzed,
                    request.value,
                    request.input,
                    is_static,
                    request.gas_limit,
                    0,
                    false,
                );
                self.run_frame(&mut frame)?
            }
            None => self.run_message(
                msg_sender,
                to,
                code_address,
                request.value,
                request.input,
                is_static,
                request.gas_limit,
                0,
            )?,
        };

        if ctx.result.is_success() {
            self.host.commit(snapshot);
        } else {
            self.host.revert(snapshot);
        }
        Ok((ctx, None))
    }

    fn execute_create_request(
        &mut self,
        request: CallRequest,
    ) -> Result<(ContextResult, Option<Address>), InternalError> {
        let fork = self.env.fork;
        let init_code = request.code.unwrap_or(request.input);
        let mut gas = Gas::new(request.gas_limit);

        let halt_with = |result: TxResult, gas: Gas| ContextResult {
            result,
            gas,
            output: Bytes::new(),
        };

        if fork >= Fork::Shanghai && init_code.len() > MAX_INITCODE_SIZE {
            gas.consume_all();
            return Ok((
                halt_with(
                    TxResult::Halt(ExceptionalHalt::InitCodeLimitExceeded),
                    gas,
                ),
                None,
            ));
        }
        if self.host.balance(request.caller) < request.value {
            gas.consume_all();
            return Ok((
                halt_with(TxResult::Halt(ExceptionalHalt::BalanceTooLow), gas),
                None,
            ));
        }
        let Some(creator_nonce) = self.host.increment_nonce(request.caller) else {
            gas.consume_all();
            return Ok((
                halt_with(TxResult::Halt(ExceptionalHalt::NonceOverflow), gas),
                None,
            ));
        };

        let new_address = match request.kind {
            CallKind::Create2 => create2_address(
                request.caller,
                request.salt,
                keccak_hash::keccak(init_code.as_ref()),
            ),
            _ => create_address(request.caller, creator_nonce),
        };
        self.host.access_address(new_address);

        if self.host.nonce(new_address) != 0 || self.host.code_size(new_address) != 0 {
            gas.consume_all();
            return Ok((
                halt_with(TxResult::Halt(ExceptionalHalt::CreateCollision), gas),
                None,
            ));
        }

        let snapshot = self.host.snapshot();
        let contract_nonce = if fork >= Fork::SpuriousDragon { 1 } else { 0 };
        self.host.create_account(new_address, contract_nonce);
        self.host
            .transfer(request.caller, new_address, request.value);

        let mut ctx = self.run_init_code(
            request.caller,
            new_address,
            request.value,
            init_code,
            request.gas_limit,
            0,
        )?;

        match ctx.result {
            TxResult::Success => {
                let code = ctx.output.clone();
                let deposit = u64::try_from(code.len())
                    .unwrap_or(u64::MAX)
                    .saturating_mul(CODE_DEPOSIT_COST_PER_BYTE);
                let deploy_halt = if fork >= Fork::SpuriousDragon && code.len() > MAX_CODE_SIZE {
                    Some(ExceptionalHalt::CodeSizeExceeded)
                } else if fork >= Fork::London && code.first() == Some(&EOF_PREFIX) {
                    Some(ExceptionalHalt::InvalidCodePrefix)
                } else if ctx.gas.charge(deposit).is_err() {
                    Some(ExceptionalHalt::OutOfGas)
                } else {
                    None
                };
                if let Some(halt) = deploy_halt {
                    self.host.revert(snapshot);
                    ctx.gas.consume_all();
                    return Ok((halt_with(TxResult::Halt(halt), ctx.gas), None));
                }
                self.host.set_code(new_address, code);
                self.host.commit(snapshot);
                Ok((ctx, Some(new_address)))
            }
            _ => {
                self.host.revert(snapshot);
                Ok((ctx, None))
            }
        }
    }

    /// Run a message call: precompile short-circuit, or code fetched from
    /// the host and executed in a fresh frame.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn run_message(
        &mut self,
        msg_sender: Address,
        to: Address,
        code_address: Address,
        msg_value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
    ) -> Result<ContextResult, InternalError> {
        if self.precompiles.is_precompile(code_address) {
            return Ok(self.run_precompile(code_address, &calldata, gas_limit));
        }
        let code = self.host.code(code_address);
        let analyzed = self.analysis.analyze(code, self.env.fork);
        let mut frame = CallFrame::new(
            msg_sender,
            to,
            code_address,
            analyzed,
            msg_value,
            calldata,
            is_static,
            gas_limit,
            depth,
            false,
        );
        self.run_frame(&mut frame)
    }

    /// Run init code in a create frame.
    pub(crate) fn run_init_code(
        &mut self,
        creator: Address,
        address: Address,
        value: U256,
        init_code: Bytes,
        gas_limit: u64,
        depth: usize,
    ) -> Result<ContextResult, InternalError> {
        let analyzed = self.analysis.analyze(init_code, self.env.fork);
        let mut frame = CallFrame::new(
            creator,
            address,
            address,
            analyzed,
            value,
            Bytes::new(),
            false,
            gas_limit,
            depth,
            true,
        );
        self.run_frame(&mut frame)
    }

    fn run_precompile(
        &mut self,
        address: Address,
        input: &Bytes,
        gas_limit: u64,
    ) -> ContextResult {
        let mut gas = Gas::new(gas_limit);
        match self.precompiles.execute(address, input.as_ref(), gas_limit) {
            Ok((output, gas_used)) => {
                let result = if gas.charge(gas_used).is_ok() {
                    TxResult::Success
                } else {
                    gas.consume_all();
                    TxResult::Halt(ExceptionalHalt::OutOfGas)
                };
                ContextResult {
                    result,
                    gas,
                    output,
                }
            }
            Err(PrecompileError::OutOfGas) => {
                gas.consume_all();
                ContextResult {
                    result: TxResult::Halt(ExceptionalHalt::OutOfGas),
                    gas,
                    output: Bytes::new(),
                }
            }
            Err(PrecompileError::Failure) => {
                gas.consume_all();
                ContextResult {
                    result: TxResult::Halt(ExceptionalHalt::PrecompileFailure),
                    gas,
                    output: Bytes::new(),
                }
            }
        }
    }

    /// The interpreter loop for one frame.
    pub(crate) fn run_frame(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<ContextResult, InternalError> {
        let code = std::sync::Arc::clone(&frame.code);
        tracing::trace!(
            depth = frame.depth,
            address = ?frame.to,
            gas = frame.gas.limit(),
            "frame started"
        );
        loop {
            let Some(instruction) = code.instruction(frame.ip) else {
                // Running off the end of the stream is an implicit STOP.
                return Ok(self.finish_frame(frame, TxResult::Success, Bytes::new()));
            };

            match instruction {
                Instruction::BlockHeader(info) => {
                    if self.budget_exhausted() {
                        return Ok(self.finish_frame(
                            frame,
                            TxResult::Halt(ExceptionalHalt::OutOfGas),
                            Bytes::new(),
                        ));
                    }
                    if let Err(halt) = Self::enter_block(frame, info) {
                        return Ok(self.finish_frame(frame, TxResult::Halt(halt), Bytes::new()));
                    }
                    frame.ip = frame.ip.checked_add(1).ok_or(InternalError::PcOverflow)?;
                }
                Instruction::Op {
                    opcode,
                    pc,
                    immediate,
                } => {
                    self.instructions_executed = self.instructions_executed.saturating_add(1);
                    let gas_before = frame.gas.remaining();
                    self.trace_pre_step(frame, opcode, pc);

                    let result = self.dispatch(frame, opcode, pc, immediate);
                    self.trace_post_step(frame, gas_before, &result);

                    match result {
                        Ok(OpcodeResult::Continue) => {
                            frame.ip =
                                frame.ip.checked_add(1).ok_or(InternalError::PcOverflow)?;
                        }
                        Ok(OpcodeResult::Jump(target)) => frame.ip = target,
                        Ok(OpcodeResult::Stop) | Ok(OpcodeResult::SelfDestruct) => {
                            return Ok(self.finish_frame(frame, TxResult::Success, Bytes::new()));
                        }
                        Ok(OpcodeResult::Return) => {
                            let output = std::mem::take(&mut frame.output);
                            return Ok(self.finish_frame(frame, TxResult::Success, output));
                        }
                        Ok(OpcodeResult::Revert) => {
                            let output = std::mem::take(&mut frame.output);
                            return Ok(self.finish_frame(frame, TxResult::Revert, output));
                        }
                        Err(VMError::Halt(halt)) => {
                            return Ok(self.finish_frame(
                                frame,
                                TxResult::Halt(halt),
                                Bytes::new(),
                            ));
                        }
                        Err(VMError::Internal(error)) => return Err(error),
                    }
                }
            }
        }
    }

    /// Block entry: validate the stack against the block's metrics and
    /// charge its aggregate static gas. After this, no instruction in the
    /// block needs a stack check, and static-only instructions need no gas
    /// check either.
    fn enter_block(frame: &mut CallFrame, info: BlockInfo) -> Result<(), ExceptionalHalt> {
        let height = frame.stack.len();
        if height < usize::try_from(info.min_stack).unwrap_or(usize::MAX) {
            return Err(ExceptionalHalt::StackUnderflow);
        }
        let peak = height.saturating_add(usize::try_from(info.max_growth).unwrap_or(usize::MAX));
        if peak > STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow);
        }
        frame.gas.charge(info.gas)
    }

    fn budget_exhausted(&self) -> bool {
        self.instruction_budget
            .map(|budget| self.instructions_executed > budget)
            .unwrap_or(false)
    }

    /// Settle the meter and produce the frame's terminal record.
    fn finish_frame(
        &mut self,
        frame: &mut CallFrame,
        result: TxResult,
        output: Bytes,
    ) -> ContextResult {
        // A leftover debt from block pre-charging around a child call means
        // the frame could never have paid for its final block.
        let (result, output) = if !matches!(result, TxResult::Halt(_))
            && frame.gas.settle().is_err()
        {
            (TxResult::Halt(ExceptionalHalt::OutOfGas), Bytes::new())
        } else {
            (result, output)
        };
        if matches!(result, TxResult::Halt(_)) {
            frame.gas.consume_all();
        }

        if let Some(tracer) = self.tracer.as_mut() {
            tracer.finalize(&FrameOutcome {
                depth: frame.depth,
                gas_used: frame.gas.used(),
                failed: !result.is_success(),
                return_data: output.clone(),
                result,
            });
        }
        tracing::trace!(
            depth = frame.depth,
            result = ?result,
            gas_used = frame.gas.used(),
            "frame finished"
        );
        ContextResult {
            result,
            gas: frame.gas,
            output,
        }
    }

    fn trace_pre_step(&mut self, frame: &CallFrame, opcode: Opcode, pc: u32) {
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.pre_step(&StepInfo {
                pc: usize::try_from(pc).unwrap_or(usize::MAX),
                opcode: opcode.as_u8(),
                mnemonic: opcode.mnemonic(),
                gas_remaining: frame.gas.remaining(),
                depth: frame.depth,
                stack_size: frame.stack.len(),
                memory_size: frame.memory.len(),
                address: frame.to,
            });
        }
    }

    fn trace_post_step(
        &mut self,
        frame: &CallFrame,
        gas_before: u64,
        result: &Result<OpcodeResult, VMError>,
    ) {
        let effects = std::mem::take(&mut self.step_effects);
        if let Some(tracer) = self.tracer.as_mut() {
            let caps = tracer.caps();
            let error = match result {
                Err(VMError::Halt(halt)) => Some(*halt),
                _ => None,
            };
            tracer.post_step(&StepResult {
                gas_cost: gas_before.saturating_sub(frame.gas.remaining()),
                stack: frame.stack.snapshot_top(caps.max_stack_items),
                stack_truncated: frame.stack.len() > caps.max_stack_items,
                memory: frame.memory.snapshot_prefix(caps.max_memory_bytes),
                memory_truncated: frame.memory.len() > caps.max_memory_bytes,
                storage_change: effects.storage_change,
                log_emitted: effects.log_emitted,
                error,
            });
        }
    }

    fn correction(immediate: Immediate) -> Result<u64, VMError> {
        match immediate {
            Immediate::GasCorrection(correction) => Ok(correction),
            _ => Err(InternalError::CorruptedStream.into()),
        }
    }

    fn dispatch(
        &mut self,
        frame: &mut CallFrame,
        opcode: Opcode,
        pc: u32,
        immediate: Immediate,
    ) -> Result<OpcodeResult, VMError> {
        match opcode {
            Opcode::STOP => self.op_stop(frame),
            Opcode::ADD => self.op_add(frame),
            Opcode::MUL => self.op_mul(frame),
            Opcode::SUB => self.op_sub(frame),
            Opcode::DIV => self.op_div(frame),
            Opcode::SDIV => self.op_sdiv(frame),
            Opcode::MOD => self.op_mod(frame),
            Opcode::SMOD => self.op_smod(frame),
            Opcode::ADDMOD => self.op_addmod(frame),
            Opcode::MULMOD => self.op_mulmod(frame),
            Opcode::EXP => self.op_exp(frame),
            Opcode::SIGNEXTEND => self.op_signextend(frame),
            Opcode::LT => self.op_lt(frame),
            Opcode::GT => self.op_gt(frame),
            Opcode::SLT => self.op_slt(frame),
            Opcode::SGT => self.op_sgt(frame),
            Opcode::EQ => self.op_eq(frame),
            Opcode::ISZERO => self.op_iszero(frame),
            Opcode::AND => self.op_and(frame),
            Opcode::OR => self.op_or(frame),
            Opcode::XOR => self.op_xor(frame),
            Opcode::NOT => self.op_not(frame),
            Opcode::BYTE => self.op_byte(frame),
            Opcode::SHL => self.op_shl(frame),
            Opcode::SHR => self.op_shr(frame),
            Opcode::SAR => self.op_sar(frame),
            Opcode::KECCAK256 => self.op_keccak256(frame),
            Opcode::ADDRESS => self.op_address(frame),
            Opcode::BALANCE => self.op_balance(frame),
            Opcode::ORIGIN => self.op_origin(frame),
            Opcode::CALLER => self.op_caller(frame),
            Opcode::CALLVALUE => self.op_callvalue(frame),
            Opcode::CALLDATALOAD => self.op_calldataload(frame),
            Opcode::CALLDATASIZE => self.op_calldatasize(frame),
            Opcode::CALLDATACOPY => self.op_calldatacopy(frame),
            Opcode::CODESIZE => self.op_codesize(frame),
            Opcode::CODECOPY => self.op_codecopy(frame),
            Opcode::GASPRICE => self.op_gasprice(frame),
            Opcode::EXTCODESIZE => self.op_extcodesize(frame),
            Opcode::EXTCODECOPY => self.op_extcodecopy(frame),
            Opcode::RETURNDATASIZE => self.op_returndatasize(frame),
            Opcode::RETURNDATACOPY => self.op_returndatacopy(frame),
            Opcode::EXTCODEHASH => self.op_extcodehash(frame),
            Opcode::BLOCKHASH => self.op_blockhash(frame),
            Opcode::COINBASE => self.op_coinbase(frame),
            Opcode::TIMESTAMP => self.op_timestamp(frame),
            Opcode::NUMBER => self.op_number(frame),
            Opcode::PREVRANDAO => self.op_prevrandao(frame),
            Opcode::GASLIMIT => self.op_gaslimit(frame),
            Opcode::CHAINID => self.op_chainid(frame),
            Opcode::SELFBALANCE => self.op_selfbalance(frame),
            Opcode::BASEFEE => self.op_basefee(frame),
            Opcode::BLOBHASH => self.op_blobhash(frame),
            Opcode::BLOBBASEFEE => self.op_blobbasefee(frame),
            Opcode::POP => self.op_pop(frame),
            Opcode::MLOAD => self.op_mload(frame),
            Opcode::MSTORE => self.op_mstore(frame),
            Opcode::MSTORE8 => self.op_mstore8(frame),
            Opcode::SLOAD => self.op_sload(frame),
            Opcode::SSTORE => self.op_sstore(frame, Self::correction(immediate)?),
            Opcode::JUMP => self.op_jump(frame),
            Opcode::JUMPI => self.op_jumpi(frame),
            Opcode::PC => self.op_pc(frame, pc),
            Opcode::MSIZE => self.op_msize(frame),
            Opcode::GAS => self.op_gas(frame, Self::correction(immediate)?),
            Opcode::JUMPDEST => self.op_jumpdest(frame),
            Opcode::TLOAD => self.op_tload(frame),
            Opcode::TSTORE => self.op_tstore(frame),
            Opcode::MCOPY => self.op_mcopy(frame),
            Opcode::PUSH0 => self.op_push0(frame),
            Opcode::LOG0 | Opcode::LOG1 | Opcode::LOG2 | Opcode::LOG3 | Opcode::LOG4 => {
                self.op_log(frame, opcode.log_topic_count())
            }
            Opcode::CREATE => self.op_create(frame, Self::correction(immediate)?),
            Opcode::CALL => self.op_call(frame, Self::correction(immediate)?),
            Opcode::CALLCODE => self.op_callcode(frame, Self::correction(immediate)?),
            Opcode::RETURN => self.op_return(frame),
            Opcode::DELEGATECALL => self.op_delegatecall(frame, Self::correction(immediate)?),
            Opcode::CREATE2 => self.op_create2(frame, Self::correction(immediate)?),
            Opcode::STATICCALL => self.op_staticcall(frame, Self::correction(immediate)?),
            Opcode::REVERT => self.op_revert(frame),
            Opcode::INVALID => self.op_invalid(frame),
            Opcode::SELFDESTRUCT => self.op_selfdestruct(frame),
            op if op.is_push_with_immediate() => match immediate {
                Immediate::Push(value) => self.op_push(frame, value),
                _ => Err(InternalError::CorruptedStream.into()),
            },
            op if op.dup_depth() > 0 => self.op_dup(frame, op.dup_depth()),
            op if op.swap_depth() > 0 => self.op_swap(frame, op.swap_depth()),
            _ => Err(ExceptionalHalt::InvalidOpcode.into()),
        }
    }
}
