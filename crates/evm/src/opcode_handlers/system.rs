// System Operations (10)
// Opcodes: CREATE, CALL, CALLCODE, RETURN, DELEGATECALL, CREATE2,
// STATICCALL, REVERT, INVALID, SELFDESTRUCT

use crate::{
    call_frame::CallFrame,
    constants::{
        CALL_DEPTH_LIMIT, CODE_DEPOSIT_COST_PER_BYTE, EOF_PREFIX, MAX_CODE_SIZE,
        MAX_INITCODE_SIZE,
    },
    errors::{ExceptionalHalt, OpcodeResult, TxResult, VMError},
    gas_cost,
    host::Host,
    memory::calculate_memory_size,
    utils::{create2_address, create_address},
    vm::Vm,
};
use bytes::Bytes;
use kestrel_common::{
    Address, Fork, U256,
    utils::{address_to_word, word_to_address},
};

/// Everything `generic_call` needs to build and run a child frame.
pub(crate) struct CallArgs {
    /// Gas limit for the child, stipend included.
    pub gas_limit: u64,
    pub msg_sender: Address,
    /// Account the child acts on (its ADDRESS / storage context).
    pub to: Address,
    /// Account whose code runs.
    pub code_address: Address,
    /// The child's CALLVALUE.
    pub msg_value: U256,
    /// Amount actually moved from caller to `to` (zero for CALLCODE,
    /// DELEGATECALL and STATICCALL).
    pub transfer_value: U256,
    /// Balance the caller must hold for the call to begin (CALL and
    /// CALLCODE check even when nothing moves between accounts).
    pub required_balance: U256,
    pub is_static: bool,
    pub args_offset: usize,
    pub args_size: usize,
    pub ret_offset: usize,
    pub ret_size: usize,
}

impl<H: Host> Vm<'_, H> {
    // RETURN operation
    pub(crate) fn op_return(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        if size > 0 {
            let new_memory_size = calculate_memory_size(offset, size)?;
            frame.gas.charge(gas_cost::memory_expansion_cost(
                new_memory_size,
                frame.memory.len(),
            ))?;
            let offset: usize = offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?;
            frame.output = frame.memory.load_range(offset, size);
        }
        Ok(OpcodeResult::Return)
    }

    // REVERT operation
    pub(crate) fn op_revert(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        if size > 0 {
            let new_memory_size = calculate_memory_size(offset, size)?;
            frame.gas.charge(gas_cost::memory_expansion_cost(
                new_memory_size,
                frame.memory.len(),
            ))?;
            let offset: usize = offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?;
            frame.output = frame.memory.load_range(offset, size);
        }
        Ok(OpcodeResult::Revert)
    }

    // INVALID operation
    pub(crate) fn op_invalid(&mut self, _frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidOpcode.into())
    }

    // SELFDESTRUCT operation
    pub(crate) fn op_selfdestruct(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::StaticContextViolation.into());
        }
        let beneficiary = word_to_address(frame.stack.pop()?);
        let fork = self.env.fork;

        let is_cold = self.host.access_address(beneficiary).is_cold();
        let balance = self.host.balance(frame.to);
        let beneficiary_exists = self.host.account_exists(beneficiary);
        let beneficiary_is_empty = self.host.is_empty(beneficiary);
        let (cost, refund_if_first) = gas_cost::selfdestruct_cost(
            fork,
            is_cold,
            beneficiary_exists,
            beneficiary_is_empty,
            balance,
            true,
        );
        frame.gas.charge(cost)?;

        if fork >= Fork::Cancun && !self.host.created_in_transaction(frame.to) {
            // EIP-6780: the balance still moves, but the account survives.
            if frame.to != beneficiary {
                self.host.transfer(frame.to, beneficiary, balance);
            }
        } else {
            let result = self.host.selfdestruct(frame.to, beneficiary);
            if !result.previously_destructed {
                frame.gas.record_refund(refund_if_first);
            }
        }
        Ok(OpcodeResult::SelfDestruct)
    }

    // CALL operation
    pub(crate) fn op_call(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        let gas_requested = frame.stack.pop()?;
        let callee = word_to_address(frame.stack.pop()?);
        let value = frame.stack.pop()?;
        let (args_offset, args_size, ret_offset, ret_size) = self.pop_call_memory_args(frame)?;

        if frame.is_static && !value.is_zero() {
            return Err(ExceptionalHalt::StaticContextViolation.into());
        }

        let expansion = self.call_memory_expansion(
            frame,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )?;
        let is_cold = self.host.access_address(callee).is_cold();
        let callee_exists = self.host.account_exists(callee);
        let callee_is_empty = self.host.is_empty(callee);
        let (total_cost, child_gas) = gas_cost::call_cost(
            self.env.fork,
            is_cold,
            value,
            callee_exists,
            callee_is_empty,
            true,
            gas_requested,
            frame.gas.corrected_remaining(correction),
            expansion,
        )?;
        frame.gas.reserve_for_child(total_cost)?;

        let msg_sender = frame.to;
        let is_static = frame.is_static;
        self.generic_call(
            frame,
            CallArgs {
                gas_limit: child_gas,
                msg_sender,
                to: callee,
                code_address: callee,
                msg_value: value,
                transfer_value: value,
                required_balance: value,
                is_static,
                args_offset,
                args_size,
                ret_offset,
                ret_size,
            },
        )
    }

    // CALLCODE operation
    pub(crate) fn op_callcode(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        let gas_requested = frame.stack.pop()?;
        let code_address = word_to_address(frame.stack.pop()?);
        let value = frame.stack.pop()?;
        let (args_offset, args_size, ret_offset, ret_size) = self.pop_call_memory_args(frame)?;

        let expansion = self.call_memory_expansion(
            frame,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )?;
        let is_cold = self.host.access_address(code_address).is_cold();
        let (total_cost, child_gas) = gas_cost::call_cost(
            self.env.fork,
            is_cold,
            value,
            true,
            false,
            false,
            gas_requested,
            frame.gas.corrected_remaining(correction),
            expansion,
        )?;
        frame.gas.reserve_for_child(total_cost)?;

        // Runs foreign code against our own account; no funds move.
        let msg_sender = frame.to;
        let to = frame.to;
        let is_static = frame.is_static;
        self.generic_call(
            frame,
            CallArgs {
                gas_limit: child_gas,
                msg_sender,
                to,
                code_address,
                msg_value: value,
                transfer_value: U256::zero(),
                required_balance: value,
                is_static,
                args_offset,
                args_size,
                ret_offset,
                ret_size,
            },
        )
    }

    // DELEGATECALL operation
    pub(crate) fn op_delegatecall(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        let gas_requested = frame.stack.pop()?;
        let code_address = word_to_address(frame.stack.pop()?);
        let (args_offset, args_size, ret_offset, ret_size) = self.pop_call_memory_args(frame)?;

        let expansion = self.call_memory_expansion(
            frame,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )?;
        let is_cold = self.host.access_address(code_address).is_cold();
        let (total_cost, child_gas) = gas_cost::call_cost(
            self.env.fork,
            is_cold,
            U256::zero(),
            true,
            false,
            false,
            gas_requested,
            frame.gas.corrected_remaining(correction),
            expansion,
        )?;
        frame.gas.reserve_for_child(total_cost)?;

        // Caller and value are inherited, preserving the call context.
        let msg_sender = frame.msg_sender;
        let to = frame.to;
        let msg_value = frame.msg_value;
        let is_static = frame.is_static;
        self.generic_call(
            frame,
            CallArgs {
                gas_limit: child_gas,
                msg_sender,
                to,
                code_address,
                msg_value,
                transfer_value: U256::zero(),
                required_balance: U256::zero(),
                is_static,
                args_offset,
                args_size,
                ret_offset,
                ret_size,
            },
        )
    }

    // STATICCALL operation
    pub(crate) fn op_staticcall(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        let gas_requested = frame.stack.pop()?;
        let callee = word_to_address(frame.stack.pop()?);
        let (args_offset, args_size, ret_offset, ret_size) = self.pop_call_memory_args(frame)?;

        let expansion = self.call_memory_expansion(
            frame,
            args_offset,
            args_size,
            ret_offset,
            ret_size,
        )?;
        let is_cold = self.host.access_address(callee).is_cold();
        let (total_cost, child_gas) = gas_cost::call_cost(
            self.env.fork,
            is_cold,
            U256::zero(),
            true,
            false,
            false,
            gas_requested,
            frame.gas.corrected_remaining(correction),
            expansion,
        )?;
        frame.gas.reserve_for_child(total_cost)?;

        let msg_sender = frame.to;
        self.generic_call(
            frame,
            CallArgs {
                gas_limit: child_gas,
                msg_sender,
                to: callee,
                code_address: callee,
                msg_value: U256::zero(),
                transfer_value: U256::zero(),
                required_balance: U256::zero(),
                is_static: true,
                args_offset,
                args_size,
                ret_offset,
                ret_size,
            },
        )
    }

    // CREATE operation
    pub(crate) fn op_create(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        self.generic_create(frame, correction, false)
    }

    // CREATE2 operation
    pub(crate) fn op_create2(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        self.generic_create(frame, correction, true)
    }

    fn pop_call_memory_args(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<(usize, usize, usize, usize), VMError> {
        let args_offset_word = frame.stack.pop()?;
        let args_size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        let ret_offset_word = frame.stack.pop()?;
        let ret_size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;

        let args_offset: usize = if args_size == 0 {
            0
        } else {
            args_offset_word
                .try_into()
                .map_err(|_| ExceptionalHalt::OutOfGas)?
        };
        let ret_offset: usize = if ret_size == 0 {
            0
        } else {
            ret_offset_word
                .try_into()
                .map_err(|_| ExceptionalHalt::OutOfGas)?
        };
        Ok((args_offset, args_size, ret_offset, ret_size))
    }

    fn call_memory_expansion(
        &mut self,
        frame: &mut CallFrame,
        args_offset: usize,
        args_size: usize,
        ret_offset: usize,
        ret_size: usize,
    ) -> Result<u64, VMError> {
        let args_end = calculate_memory_size(U256::from(args_offset), args_size)?;
        let ret_end = calculate_memory_size(U256::from(ret_offset), ret_size)?;
        Ok(gas_cost::memory_expansion_cost(
            args_end.max(ret_end),
            frame.memory.len(),
        ))
    }

    /// Shared tail of the CALL family: depth and balance gates, value
    /// transfer under a snapshot, child execution, and result install.
    pub(crate) fn generic_call(
        &mut self,
        frame: &mut CallFrame,
        args: CallArgs,
    ) -> Result<OpcodeResult, VMError> {
        frame.return_data = Bytes::new();
        let calldata = if args.args_size == 0 {
            Bytes::new()
        } else {
            frame.memory.load_range(args.args_offset, args.args_size)
        };

        if frame.depth.saturating_add(1) > CALL_DEPTH_LIMIT {
            frame.gas.erase_cost(args.gas_limit);
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }
        if !args.required_balance.is_zero()
            && self.host.balance(frame.to) < args.required_balance
        {
            frame.gas.erase_cost(args.gas_limit);
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let snapshot = self.host.snapshot();
        if !args.transfer_value.is_zero()
            && !self
                .host
                .transfer(frame.to, args.to, args.transfer_value)
        {
            self.host.revert(snapshot);
            frame.gas.erase_cost(args.gas_limit);
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let ctx = self.run_message(
            args.msg_sender,
            args.to,
            args.code_address,
            args.msg_value,
            calldata,
            args.is_static,
            args.gas_limit,
            frame.depth.saturating_add(1),
        )?;

        match ctx.result {
            TxResult::Success => {
                self.host.commit(snapshot);
                frame.gas.absorb_child(&ctx.gas);
                frame.return_data = ctx.output;
                frame.stack.push(U256::one())?;
            }
            TxResult::Revert => {
                self.host.revert(snapshot);
                frame.gas.erase_cost(ctx.gas.remaining());
                frame.return_data = ctx.output;
                frame.stack.push(U256::zero())?;
            }
            TxResult::Halt(_) => {
                self.host.revert(snapshot);
                frame.stack.push(U256::zero())?;
            }
        }

        if args.ret_size > 0 && !frame.return_data.is_empty() {
            let copy_len = args.ret_size.min(frame.return_data.len());
            if let Some(slice) = frame.return_data.get(..copy_len) {
                let slice = slice.to_vec();
                frame.memory.store_data(args.ret_offset, &slice);
            }
        }
        Ok(OpcodeResult::Continue)
    }

    /// Shared CREATE/CREATE2 path.
    fn generic_create(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
        is_create2: bool,
    ) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::StaticContextViolation.into());
        }
        let fork = self.env.fork;

        let value = frame.stack.pop()?;
        let offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        let salt = if is_create2 {
            Some(frame.stack.pop()?)
        } else {
            None
        };

        if fork >= Fork::Shanghai && size > MAX_INITCODE_SIZE {
            return Err(ExceptionalHalt::InitCodeLimitExceeded.into());
        }

        let new_memory_size = calculate_memory_size(offset, size)?;
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        frame
            .gas
            .charge(gas_cost::create_cost(fork, size, is_create2, expansion))?;

        let available = frame.gas.corrected_remaining(correction);
        let child_gas = if fork >= Fork::TangerineWhistle {
            gas_cost::max_gas_for_child(available)
        } else {
            available
        };
        frame.gas.reserve_for_child(child_gas)?;

        frame.return_data = Bytes::new();
        let init_code = if size == 0 {
            Bytes::new()
        } else {
            let offset: usize = offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?;
            frame.memory.load_range(offset, size)
        };

        if frame.depth.saturating_add(1) > CALL_DEPTH_LIMIT
            || self.host.balance(frame.to) < value
        {
            frame.gas.erase_cost(child_gas);
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let Some(creator_nonce) = self.host.increment_nonce(frame.to) else {
            frame.gas.erase_cost(child_gas);
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        };
        let new_address = match salt {
            Some(salt) => create2_address(
                frame.to,
                salt,
                keccak_hash::keccak(init_code.as_ref()),
            ),
            None => create_address(frame.to, creator_nonce),
        };
        self.host.access_address(new_address);

        // EIP-684: an occupied address fails without running the init code
        // and swallows the forwarded gas.
        if self.host.nonce(new_address) != 0 || self.host.code_size(new_address) != 0 {
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }

        let snapshot = self.host.snapshot();
        let contract_nonce = if fork >= Fork::SpuriousDragon { 1 } else { 0 };
        self.host.create_account(new_address, contract_nonce);
        self.host.transfer(frame.to, new_address, value);

        let mut ctx = self.run_init_code(
            frame.to,
            new_address,
            value,
            init_code,
            child_gas,
            frame.depth.saturating_add(1),
        )?;

        match ctx.result {
            TxResult::Success => {
                let code = ctx.output.clone();
                let deposit = u64::try_from(code.len())
                    .unwrap_or(u64::MAX)
                    .saturating_mul(CODE_DEPOSIT_COST_PER_BYTE);
                let oversized = fork >= Fork::SpuriousDragon && code.len() > MAX_CODE_SIZE;
                let bad_prefix =
                    fork >= Fork::London && code.first() == Some(&EOF_PREFIX);
                if oversized || bad_prefix || ctx.gas.charge(deposit).is_err() {
                    // Deploy-time failures behave like a child halt: the
                    // forwarded gas is gone and nothing was created.
                    self.host.revert(snapshot);
                    frame.stack.push(U256::zero())?;
                    return Ok(OpcodeResult::Continue);
                }
                self.host.set_code(new_address, code);
                self.host.commit(snapshot);
                frame.gas.absorb_child(&ctx.gas);
                frame.stack.push(address_to_word(new_address))?;
            }
            TxResult::Revert => {
                self.host.revert(snapshot);
                frame.gas.erase_cost(ctx.gas.remaining());
                frame.return_data = ctx.output;
                frame.stack.push(U256::zero())?;
            }
            TxResult::Halt(_) => {
                self.host.revert(snapshot);
                frame.stack.push(U256::zero())?;
            }
        }
        Ok(OpcodeResult::Continue)
    }
}
