// Arithmetic Operations (11)
// Opcodes: ADD, MUL, SUB, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP, SIGNEXTEND

use crate::{
    arithmetic,
    call_frame::CallFrame,
    errors::{OpcodeResult, VMError},
    gas_cost,
    host::Host,
    vm::Vm,
};

impl<H: Host> Vm<'_, H> {
    pub(crate) fn op_add(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(a.overflowing_add(b).0)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mul(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(a.overflowing_mul(b).0)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sub(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(a.overflowing_sub(b).0)?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_div(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(arithmetic::div(a, b))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_sdiv(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(arithmetic::sdiv(a, b))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(arithmetic::rem(a, b))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_smod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        frame.stack.push(arithmetic::srem(a, b))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_addmod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        let n = frame.stack.pop()?;
        frame.stack.push(arithmetic::addmod(a, b, n))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_mulmod(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let a = frame.stack.pop()?;
        let b = frame.stack.pop()?;
        let n = frame.stack.pop()?;
        frame.stack.push(arithmetic::mulmod(a, b, n))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_exp(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let base = frame.stack.pop()?;
        let exponent = frame.stack.pop()?;
        frame
            .gas
            .charge(gas_cost::exp_cost(exponent, self.env.fork))?;
        frame.stack.push(arithmetic::exp(base, exponent))?;
        Ok(OpcodeResult::Continue)
    }

    pub(crate) fn op_signextend(&mut self, frame: &mut CallFrame) -> Result<OpcodeResult, VMError> {
        let byte_index = frame.stack.pop()?;
        let value = frame.stack.pop()?;
        frame.stack.push(arithmetic::signextend(byte_index, value))?;
        Ok(OpcodeResult::Continue)
    }
}
