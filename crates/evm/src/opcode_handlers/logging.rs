// Logging Operations (5)
// Opcodes: LOG0, LOG1, LOG2, LOG3, LOG4

use crate::{
    call_frame::CallFrame,
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    host::Host,
    memory::calculate_memory_size,
    vm::Vm,
};
use kestrel_common::{Log, utils::word_to_h256};

impl<H: Host> Vm<'_, H> {
    pub(crate) fn op_log(
        &mut self,
        frame: &mut CallFrame,
        topic_count: usize,
    ) -> Result<OpcodeResult, VMError> {
        if frame.is_static {
            return Err(ExceptionalHalt::StaticContextViolation.into());
        }

        let offset = frame.stack.pop()?;
        let size: usize = frame
            .stack
            .pop()?
            .try_into()
            .map_err(|_| ExceptionalHalt::OutOfGas)?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            topics.push(word_to_h256(frame.stack.pop()?));
        }

        let new_memory_size = calculate_memory_size(offset, size)?;
        let expansion = gas_cost::memory_expansion_cost(new_memory_size, frame.memory.len());
        frame
            .gas
            .charge(gas_cost::log_cost(topic_count, size).saturating_add(expansion))?;

        let offset: usize = if size == 0 {
            0
        } else {
            offset.try_into().map_err(|_| ExceptionalHalt::OutOfGas)?
        };
        let data = frame.memory.load_range(offset, size);
        let log = Log::new(frame.to, topics, data);
        if self.tracer.is_some() {
            self.step_effects.log_emitted = Some(log.clone());
        }
        self.host.emit_log(log);
        Ok(OpcodeResult::Continue)
    }
}
