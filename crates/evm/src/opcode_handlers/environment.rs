// Environmental Information (17)
// Opcodes: ADDRESS, BALANCE, ORIGIN, CALLER, CALLVALUE, CALLDATALOAD,
// CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY, GASPRICE, EXTCODESIZE,
// EXTCODECOPY, RETURNDATASIZE, RETURNDATACOPY, EXTCODEHASH, SELFBALANCE

use crate::{
    call_frame::CallFrame,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    host::Host,
    memory::calculate_memory_size,
    vm::Vm,
};
use kestrel_common::{
    U256,
    utils::{address_to_word, h256_to_word, word_to_address},
};

/// 32 bytes of `source` starting at `offset`, zero-padded past the end.
fn load_word_padded(source: &[u8], offset: U256) -> U256 {
    let mut word = [0u8; 32];
    if let Ok(offset) = usize::try_from(offset) {
        if offset < source.len() {
            let end = offset.saturating_add(32).min(source.len());
            if let (Some(src), Some(dst)) = (
                source.get(offset..end),
                word.get_mut(..end.saturating_sub(offset)),
            ) {
                dst.copy_from_slice(src);
            }
        }
    }
    U256::from_big_endian(&word)
}

/// `size` bytes of `source` starting at `offset`, zero-padded past the end.
fn load_slice_padded(source: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    if let Ok(offset) = usize::try_from(offset) {
        if offset < source.len() {
            let end = offset.saturating_add(size).min(source.len());
            if let (Some(src), Some(dst)) = (
                source.get(offset..end),
                data.get_mut(..end.saturating_sub(offset)),
            ) {
                dst.copy_from_slice(src);
            }
        }
    }
    data
}

impl<H: Host> Vm<'_, H> {
    pub(crate) fn op_address(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(address_to_word(frame.to))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_balance(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(frame.stack.pop()?);
        let is_cold = self.host.access_address(address).is_cold();
        frame
            .gas
            .charge(gas_cost::balance_cost(self.env.fork, is_cold))?;
        frame.stack.push(self.host.balance(address))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_origin(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(address_to_word(self.env.origin))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_caller(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(address_to_word(frame.msg_sender))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_callvalue(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(frame.msg_value)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_calldataload(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        let offset = frame.stack.pop()?;
        frame
            .stack
            .push(load_word_padded(frame.calldata.as_ref(), offset))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_calldatasize(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.push(U256::from(frame.calldata.len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_calldatacopy(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        let dest_offset = frame.stack.pop()?;
        let src_offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        frame
            .gas
            .charge(gas_cost::copy_cost(size).saturating_add(expansion))?;
        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let data = load_slice_padded(frame.calldata.as_ref(), src_offset, size);
        let dest_offset: usize = dest_offset
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        frame.memory.store_data(dest_offset, &data);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_codesize(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(U256::from(frame.code.code().len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_codecopy(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let dest_offset = frame.stack.pop()?;
        let src_offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        frame
            .gas
            .charge(gas_cost::copy_cost(size).saturating_add(expansion))?;
        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let data = load_slice_padded(frame.code.code().as_ref(), src_offset, size);
        let dest_offset: usize = dest_offset
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        frame.memory.store_data(dest_offset, &data);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_gasprice(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(self.env.gas_price)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_extcodesize(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(frame.stack.pop()?);
        let is_cold = self.host.access_address(address).is_cold();
        frame
            .gas
            .charge(gas_cost::extcodesize_cost(self.env.fork, is_cold))?;
        frame.stack.push(U256::from(self.host.code_size(address)))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_extcodecopy(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(frame.stack.pop()?);
        let dest_offset = frame.stack.pop()?;
        let src_offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;

        let is_cold = self.host.access_address(address).is_cold();
        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        let cost = gas_cost::extcodecopy_base_cost(self.env.fork, is_cold)
            .saturating_add(gas_cost::copy_cost(size))
            .saturating_add(expansion);
        frame.gas.charge(cost)?;
        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let code = self.host.code(address);
        let data = load_slice_padded(code.as_ref(), src_offset, size);
        let dest_offset: usize = dest_offset
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        frame.memory.store_data(dest_offset, &data);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_returndatasize(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.push(U256::from(frame.return_data.len()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_returndatacopy(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        let dest_offset = frame.stack.pop()?;
        let src_offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;

        let new_memory_size = calculate_memory_size(dest_offset, size)?;
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        frame
            .gas
            .charge(gas_cost::copy_cost(size).saturating_add(expansion))?;

        // Unlike the other copies, reading past the return-data buffer is an
        // exceptional halt, not zero padding.
        let src_offset: usize = src_offset
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        let end = src_offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::OutOfGas)?;
        if end > frame.return_data.len() {
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        if size == 0 {
            return Ok(OpcodeResult::Continue);
        }

        let data = frame
            .return_data
            .get(src_offset..end)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let dest_offset: usize = dest_offset
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        frame.memory.store_data(dest_offset, &data);
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_extcodehash(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(frame.stack.pop()?);
        let is_cold = self.host.access_address(address).is_cold();
        frame
            .gas
            .charge(gas_cost::extcodehash_cost(self.env.fork, is_cold))?;
        // EIP-1052: empty (or missing) accounts hash to zero.
        if self.host.is_empty(address) {
            frame.stack.push(U256::zero())?;
        } else {
            frame.stack.push(h256_to_word(self.host.code_hash(address)))?;
        }
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_selfbalance(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.push(self.host.balance(frame.to))?;
        Ok(OpcodeResult::Continue)
    }
}
