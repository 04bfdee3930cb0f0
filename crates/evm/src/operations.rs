//! A small assembler for tests and benches.
//!
//! `Operation` mirrors the opcode set one-to-one; sequences compile to raw
//! bytecode with [`ops_to_bytecode`]. Tests build programs from these
//! instead of hand-counting hex offsets.

use crate::opcodes::Opcode;
use bytes::{BufMut, Bytes, BytesMut};
use kestrel_common::U256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    Sdiv,
    Mod,
    SMod,
    Addmod,
    Mulmod,
    Exp,
    SignExtend,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    IsZero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Shl,
    Shr,
    Sar,
    Keccak256,
    Address,
    Balance,
    Origin,
    Caller,
    Callvalue,
    CallDataLoad,
    CallDataSize,
    CallDataCopy,
    CodeSize,
    CodeCopy,
    GasPrice,
    ExtCodeSize,
    ExtCodeCopy,
    ReturnDataSize,
    ReturnDataCopy,
    ExtCodeHash,
    BlockHash,
    Coinbase,
    Timestamp,
    Number,
    PrevRandao,
    GasLimit,
    ChainId,
    SelfBalance,
    BaseFee,
    BlobHash,
    BlobBaseFee,
    Pop,
    Mload,
    Mstore,
    Mstore8,
    Sload,
    Sstore,
    Jump,
    Jumpi,
    PC,
    Msize,
    Gas,
    Jumpdest,
    Tload,
    Tstore,
    Mcopy,
    Push0,
    /// `(n, value)`: PUSHn with the low `n` bytes of `value`.
    Push((u8, U256)),
    /// DUP1..DUP16, 1-based depth.
    Dup(u8),
    /// SWAP1..SWAP16, 1-based depth.
    Swap(u8),
    /// LOG0..LOG4 topic count.
    Log(u8),
    Create,
    Call,
    CallCode,
    Return,
    DelegateCall,
    Create2,
    StaticCall,
    Revert,
    Invalid,
    SelfDestruct,
}

impl Operation {
    pub fn to_bytecode(&self) -> Bytes {
        let mut buffer = BytesMut::new();
        match self {
            Operation::Stop => buffer.put_u8(Opcode::STOP.as_u8()),
            Operation::Add => buffer.put_u8(Opcode::ADD.as_u8()),
            Operation::Mul => buffer.put_u8(Opcode::MUL.as_u8()),
            Operation::Sub => buffer.put_u8(Opcode::SUB.as_u8()),
            Operation::Div => buffer.put_u8(Opcode::DIV.as_u8()),
            Operation::Sdiv => buffer.put_u8(Opcode::SDIV.as_u8()),
            Operation::Mod => buffer.put_u8(Opcode::MOD.as_u8()),
            Operation::SMod => buffer.put_u8(Opcode::SMOD.as_u8()),
            Operation::Addmod => buffer.put_u8(Opcode::ADDMOD.as_u8()),
            Operation::Mulmod => buffer.put_u8(Opcode::MULMOD.as_u8()),
            Operation::Exp => buffer.put_u8(Opcode::EXP.as_u8()),
            Operation::SignExtend => buffer.put_u8(Opcode::SIGNEXTEND.as_u8()),
            Operation::Lt => buffer.put_u8(Opcode::LT.as_u8()),
            Operation::Gt => buffer.put_u8(Opcode::GT.as_u8()),
            Operation::Slt => buffer.put_u8(Opcode::SLT.as_u8()),
            Operation::Sgt => buffer.put_u8(Opcode::SGT.as_u8()),
            Operation::Eq => buffer.put_u8(Opcode::EQ.as_u8()),
            Operation::IsZero => buffer.put_u8(Opcode::ISZERO.as_u8()),
            Operation::And => buffer.put_u8(Opcode::AND.as_u8()),
            Operation::Or => buffer.put_u8(Opcode::OR.as_u8()),
            Operation::Xor => buffer.put_u8(Opcode::XOR.as_u8()),
            Operation::Not => buffer.put_u8(Opcode::NOT.as_u8()),
            Operation::Byte => buffer.put_u8(Opcode::BYTE.as_u8()),
            Operation::Shl => buffer.put_u8(Opcode::SHL.as_u8()),
            Operation::Shr => buffer.put_u8(Opcode::SHR.as_u8()),
            Operation::Sar => buffer.put_u8(Opcode::SAR.as_u8()),
            Operation::Keccak256 => buffer.put_u8(Opcode::KECCAK256.as_u8()),
            Operation::Address => buffer.put_u8(Opcode::ADDRESS.as_u8()),
            Operation::Balance => buffer.put_u8(Opcode::BALANCE.as_u8()),
            Operation::Origin => buffer.put_u8(Opcode::ORIGIN.as_u8()),
            Operation::Caller => buffer.put_u8(Opcode::CALLER.as_u8()),
            Operation::Callvalue => buffer.put_u8(Opcode::CALLVALUE.as_u8()),
            Operation::CallDataLoad => buffer.put_u8(Opcode::CALLDATALOAD.as_u8()),
            Operation::CallDataSize => buffer.put_u8(Opcode::CALLDATASIZE.as_u8()),
            Operation::CallDataCopy => buffer.put_u8(Opcode::CALLDATACOPY.as_u8()),
            Operation::CodeSize => buffer.put_u8(Opcode::CODESIZE.as_u8()),
            Operation::CodeCopy => buffer.put_u8(Opcode::CODECOPY.as_u8()),
            Operation::GasPrice => buffer.put_u8(Opcode::GASPRICE.as_u8()),
            Operation::ExtCodeSize => buffer.put_u8(Opcode::EXTCODESIZE.as_u8()),
            Operation::ExtCodeCopy => buffer.put_u8(Opcode::EXTCODECOPY.as_u8()),
            Operation::ReturnDataSize => buffer.put_u8(Opcode::RETURNDATASIZE.as_u8()),
            Operation::ReturnDataCopy => buffer.put_u8(Opcode::RETURNDATACOPY.as_u8()),
            Operation::ExtCodeHash => buffer.put_u8(Opcode::EXTCODEHASH.as_u8()),
            Operation::BlockHash => buffer.put_u8(Opcode::BLOCKHASH.as_u8()),
            Operation::Coinbase => buffer.put_u8(Opcode::COINBASE.as_u8()),
            Operation::Timestamp => buffer.put_u8(Opcode::TIMESTAMP.as_u8()),
            Operation::Number => buffer.put_u8(Opcode::NUMBER.as_u8()),
            Operation::PrevRandao => buffer.put_u8(Opcode::PREVRANDAO.as_u8()),
            Operation::GasLimit => buffer.put_u8(Opcode::GASLIMIT.as_u8()),
            Operation::ChainId => buffer.put_u8(Opcode::CHAINID.as_u8()),
            Operation::SelfBalance => buffer.put_u8(Opcode::SELFBALANCE.as_u8()),
            Operation::BaseFee => buffer.put_u8(Opcode::BASEFEE.as_u8()),
            Operation::BlobHash => buffer.put_u8(Opcode::BLOBHASH.as_u8()),
            Operation::BlobBaseFee => buffer.put_u8(Opcode::BLOBBASEFEE.as_u8()),
            Operation::Pop => buffer.put_u8(Opcode::POP.as_u8()),
            Operation::Mload => buffer.put_u8(Opcode::MLOAD.as_u8()),
            Operation::Mstore => buffer.put_u8(Opcode::MSTORE.as_u8()),
            Operation::Mstore8 => buffer.put_u8(Opcode::MSTORE8.as_u8()),
            Operation::Sload => buffer.put_u8(Opcode::SLOAD.as_u8()),
            Operation::Sstore => buffer.put_u8(Opcode::SSTORE.as_u8()),
            Operation::Jump => buffer.put_u8(Opcode::JUMP.as_u8()),
            Operation::Jumpi => buffer.put_u8(Opcode::JUMPI.as_u8()),
            Operation::PC => buffer.put_u8(Opcode::PC.as_u8()),
            Operation::Msize => buffer.put_u8(Opcode::MSIZE.as_u8()),
            Operation::Gas => buffer.put_u8(Opcode::GAS.as_u8()),
            Operation::Jumpdest => buffer.put_u8(Opcode::JUMPDEST.as_u8()),
            Operation::Tload => buffer.put_u8(Opcode::TLOAD.as_u8()),
            Operation::Tstore => buffer.put_u8(Opcode::TSTORE.as_u8()),
            Operation::Mcopy => buffer.put_u8(Opcode::MCOPY.as_u8()),
            Operation::Push0 => buffer.put_u8(Opcode::PUSH0.as_u8()),
            Operation::Push((size, value)) => {
                let size = (*size).clamp(1, 32);
                buffer.put_u8(0x5F_u8.saturating_add(size));
                let bytes = value.to_big_endian();
                let start = 32_usize.saturating_sub(usize::from(size));
                buffer.put_slice(bytes.get(start..).unwrap_or_default());
            }
            Operation::Dup(depth) => {
                let depth = (*depth).clamp(1, 16);
                buffer.put_u8(0x7F_u8.saturating_add(depth));
            }
            Operation::Swap(depth) => {
                let depth = (*depth).clamp(1, 16);
                buffer.put_u8(0x8F_u8.saturating_add(depth));
            }
            Operation::Log(topic_count) => {
                let topic_count = (*topic_count).min(4);
                buffer.put_u8(0xA0_u8.saturating_add(topic_count));
            }
            Operation::Create => buffer.put_u8(Opcode::CREATE.as_u8()),
            Operation::Call => buffer.put_u8(Opcode::CALL.as_u8()),
            Operation::CallCode => buffer.put_u8(Opcode::CALLCODE.as_u8()),
            Operation::Return => buffer.put_u8(Opcode::RETURN.as_u8()),
            Operation::DelegateCall => buffer.put_u8(Opcode::DELEGATECALL.as_u8()),
            Operation::Create2 => buffer.put_u8(Opcode::CREATE2.as_u8()),
            Operation::StaticCall => buffer.put_u8(Opcode::STATICCALL.as_u8()),
            Operation::Revert => buffer.put_u8(Opcode::REVERT.as_u8()),
            Operation::Invalid => buffer.put_u8(Opcode::INVALID.as_u8()),
            Operation::SelfDestruct => buffer.put_u8(Opcode::SELFDESTRUCT.as_u8()),
        }
        buffer.freeze()
    }
}

/// Assemble a sequence of operations into bytecode.
pub fn ops_to_bytecode(operations: &[Operation]) -> Bytes {
    operations
        .iter()
        .flat_map(|operation| operation.to_bytecode())
        .collect()
}
