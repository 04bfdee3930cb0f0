// Block Information (10)
// Opcodes: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER, PREVRANDAO, GASLIMIT,
// CHAINID, BASEFEE, BLOBHASH, BLOBBASEFEE

use crate::{
    call_frame::CallFrame,
    constants::BLOCKHASH_WINDOW,
    errors::{OpcodeResult, VMError},
    host::Host,
    vm::Vm,
};
use kestrel_common::{Fork, U256, utils::address_to_word, utils::h256_to_word};

impl<H: Host> Vm<'_, H> {
    pub(crate) fn op_blockhash(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let requested = frame.stack.pop()?;
        let current = self.env.block_number;

        // Only the 256 most recent blocks, and never the current one.
        let in_window = requested < current
            && current.saturating_sub(requested) <= U256::from(BLOCKHASH_WINDOW);
        if !in_window {
            frame.stack.push(U256::zero())?;
            return Ok(OpcodeResult::Continue);
        }
        let number = requested.low_u64();
        frame
            .stack
            .push(h256_to_word(self.host.block_hash(number)))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_coinbase(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(address_to_word(self.env.coinbase))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_timestamp(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(self.env.timestamp)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_number(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(self.env.block_number)?;
        Ok(OpcodeResult::Continue)
    }

    /// DIFFICULTY before Paris, PREVRANDAO after.
    pub(crate) fn op_prevrandao(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        if self.env.fork >= Fork::Paris {
            frame.stack.push(h256_to_word(self.env.prev_randao))?;
        } else {
            frame.stack.push(self.env.difficulty)?;
        }
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_gaslimit(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(U256::from(self.env.block_gas_limit))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_chainid(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(self.env.chain_id)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_basefee(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        frame.stack.push(self.env.base_fee_per_gas)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_blobhash(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let index = frame.stack.pop()?;
        let hash = usize::try_from(index)
            .ok()
            .and_then(|index| self.env.blob_hashes.get(index))
            .copied()
            .unwrap_or_default();
        frame.stack.push(h256_to_word(hash))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_blobbasefee(
        &mut self,
        frame: &mut CallFrame,
    ) -> Result<OpcodeResult, VMError> {
        frame.stack.push(self.env.blob_base_fee)?;
        Ok(OpcodeResult::Continue)
    }
}
