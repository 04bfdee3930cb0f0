// Comparison and Bitwise Logic Operations (14)
// Opcodes: LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR, NOT, BYTE, SHL, SHR, SAR

use crate::{
    arithmetic,
    call_frame::CallFrame,
    errors::{OpcodeResult, VMError},
    host::Host,
    vm::Vm,
};
use kestrel_common::U256;

fn bool_to_word(condition: bool) -> U256 {
    if condition { U256::one() } else { U256::zero() }
}

impl<H: Host> Vm<'_, H> {
    pub(crate) fn op_lt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(bool_to_word(a < b))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_gt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(bool_to_word(a > b))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_slt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(bool_to_word(arithmetic::slt(a, b)))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sgt(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(bool_to_word(arithmetic::sgt(a, b)))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_eq(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(bool_to_word(a == b))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_iszero(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        frame.stack.push(bool_to_word(a.is_zero()))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_and(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(a & b)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_or(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(a | b)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_xor(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(a ^ b)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_not(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        frame.stack.push(!a)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_byte(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let index = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        frame.stack.push(arithmetic::byte(index, value))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_shl(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let shift = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        frame.stack.push(arithmetic::shl(shift, value))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_shr(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let shift = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        frame.stack.push(arithmetic::shr(shift, value))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sar(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let shift = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        frame.stack.push(arithmetic::sar(shift, value))?;
        Ok(OpcodeResult::Continue)
    }
}
