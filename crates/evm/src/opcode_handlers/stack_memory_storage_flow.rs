// Stack, Memory, Storage and Flow Operations (21)
// Opcodes: POP, MLOAD, MSTORE, MSTORE8, SLOAD, SSTORE, JUMP, JUMPI, PC,
// MSIZE, GAS, JUMPDEST, TLOAD, TSTORE, MCOPY, PUSH0, PUSH1..32, DUP, SWAP, STOP

use crate::{
    call_frame::CallFrame,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    host::Host,
    memory::calculate_memory_size,
    tracing::StorageChange,
    vm::Vm,
};
use kestrel_common::U256;

impl<H: Host> Vm<'_, H> {
    pub(crate) fn op_stop(&mut self, _frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        Ok(OpcodeResult::Stop)
    }

    pub(crate) fn op_pop(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.pop()?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_push(
        &mut self,
        frame: &mut CallFrame,
        value: U256,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_push0(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(U256::zero())?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_dup(
        &mut self,
        frame: &mut CallFrame,
        depth: usize,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.dup(depth)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_swap(
        &mut self,
        frame: &mut CallFrame,
        depth: usize,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.swap(depth)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mload(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = frame.stack.pop()?;
        let new_memory_size = calculate_memory_size(offset, 32)?;
        frame.gas.charge(gas_cost::memory_expansion_cost(
            new_memory_size,
            frame.memory.len(),
        ))?;
        let offset: usize = offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?;
        let value = frame.memory.load_word(offset);
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mstore(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        let new_memory_size = calculate_memory_size(offset, 32)?;
        frame.gas.charge(gas_cost::memory_expansion_cost(
            new_memory_size,
            frame.memory.len(),
        ))?;
        let offset: usize = offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?;
        frame.memory.store_word(offset, value);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mstore8(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        let new_memory_size = calculate_memory_size(offset, 1)?;
        frame.gas.charge(gas_cost::memory_expansion_cost(
            new_memory_size,
            frame.memory.len(),
        ))?;
        let offset: usize = offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?;
        frame.memory.store_byte(offset, value.byte(0));
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_msize(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(U256::from(frame.memory.len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mcopy(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let dest_offset = frame.stack.pop()?;
        let src_offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?
            .max(calculate_memory_size(src_offset, size)?);
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        frame
            .gas
            .charge(gas_cost::copy_cost(size).saturating_add(expansion))?;
        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let dest_offset: usize = dest_offset
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        let src_offset: usize = src_offset
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        frame.memory.copy_within(src_offset, dest_offset, size);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sload(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let key = frame.stack.pop()?;
        let is_cold = self.host.access_storage_slot(frame.to, key).is_cold();
        frame
            .gas
            .charge(gas_cost::sload_cost(self.env.fork, is_cold))?;
        frame.stack.push(self.host.sload(frame.to, key))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sstore(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::StaticContextViolation.into());
        }
        let key = frame.stack.pop()?;
        let new_value = frame.stack.pop()?;

        // The host journals the write; a failed gas charge below halts the
        // frame and the snapshot revert takes the write back out.
        let slot = self.host.sstore(frame.to, key, new_value);
        let (cost, refund) = gas_cost::sstore_cost(
            self.env.fork,
            slot.is_cold,
            slot.original,
            slot.current,
            new_value,
            frame.gas.corrected_remaining(correction),
        )?;
        frame.gas.charge(cost)?;
        frame.gas.record_refund(refund);

        if self.tracer.is_some() {
            self.step_effects.storage_change = Some(StorageChange {
                key,
                previous: slot.current,
                new: new_value,
            });
        }
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_tload(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let key = frame.stack.pop()?;
        frame.stack.push(self.host.tload(frame.to, key))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_tstore(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::StaticContextViolation.into());
        }
        let key = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        self.host.tstore(frame.to, key, value);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_jump(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let target = frame.stack.pop()?;
        let entry = Self::resolve_jump(frame, target)?;
        Ok(OpcodeResult::Jump(entry))
    }

    pub(crate) fn op_jumpi(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let target = frame.stack.pop()?;
        let condition = frame.stack.pop()?;
        if condition.is_zero() {
            return Ok(OpcodeResult::Continue);
        }
        let entry = Self::resolve_jump(frame, target)?;
        Ok(OpcodeResult::Jump(entry))
    }

    fn resolve_jump(frame: &CallFrame, target: U256) -> Result<usize, ExceptionalHalt> {
        let pc: usize = target
            .try_into()
            .map_err(|_| ExceptionalHalt::InvalidJump)?;
        if !frame.code.is_jumpdest(pc) {
            return Err(ExceptionalHalt::InvalidJump);
        }
        frame
            .code
            .jump_entry(pc)
            .ok_or(ExceptionalHalt::InvalidJump)
    }

    pub(crate) fn op_pc(
        &mut self,
        frame: &mut CallFrame,
        pc: u32,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.push(U256::from(pc))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_jumpdest(&mut self, _frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        Ok(OpcodeResult::Continue)
    }

    /// The block header charged this block's static gas up front; the
    /// analyzer's correction adds back the portion not yet executed.
    pub(crate) fn op_gas(
        &mut self,
        frame: &mut CallFrame,
        correction: u64,
    ) -> Result<OpcodeResult, VMError> {
        frame
            .stack
            .push(U256::from(frame.gas.corrected_remaining(correction)))?;
        Ok(OpcodeResult::Continue)
    }
}
