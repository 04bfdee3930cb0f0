// KECCAK256 (1)

use crate::{
    call_frame::CallFrame,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    host::Host,
    memory::calculate_memory_size,
    vm::Vm,
};
use kestrel_common::utils::h256_to_word;

impl<H: Host> Vm<'_, H> {
    pub(crate) fn op_keccak256(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;

        let new_memory_size = calculate_memory_size(offset, size)?;
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        frame
            .gas
            .charge(gas_cost::keccak_cost(size).saturating_add(expansion))?;

        let offset: usize = if size == 0 {
            0
        } else {
            offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?
        };
        let data = frame.memory.load_range(offset, size);
        frame
            .stack
            .push(h256_to_word(keccak_hash::keccak(data.as_ref())))?;
        Ok(OpcodeResult::Continue)
    }
}
