//! Opcode definitions and their static metadata.
//!
//! The metadata table is compile-time data: per-opcode static gas, stack
//! effect, whether the opcode ends a basic block, and the fork that
//! introduced it. Dynamic gas (memory expansion, access lists, copy sizes)
//! lives in [`crate::gas_cost`] and is charged by the handlers.

use kestrel_common::Fork;

/// Static metadata for one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Gas charged unconditionally, aggregated per basic block by the
    /// analyzer. Zero for opcodes whose entire cost is fork- or
    /// state-dependent.
    pub static_gas: u64,
    /// Words popped from the stack.
    pub inputs: u8,
    /// Words pushed onto the stack.
    pub outputs: u8,
    /// First fork in which the opcode is defined.
    pub introduced_in: Fork,
    /// True when no instruction can follow in the same basic block
    /// (terminators and branches).
    pub block_end: bool,
}

macro_rules! flag {
    () => {
        false
    };
    (end) => {
        true
    };
}

macro_rules! define_opcodes {
    ($($byte:literal => $variant:ident, $gas:literal, $inputs:literal, $outputs:literal, $fork:ident $(, $flag:ident)?;)*) => {
        /// All defined EVM opcodes through Cancun.
        #[repr(u8)]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr,
        )]
        pub enum Opcode {
            $($variant = $byte,)*
        }

        impl Opcode {
            /// Decode a bytecode byte. `None` for bytes with no assigned
            /// opcode in any fork.
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// Static metadata for this opcode.
            pub const fn info(self) -> OpcodeInfo {
                match self {
                    $(
                        Opcode::$variant => OpcodeInfo {
                            static_gas: $gas,
                            inputs: $inputs,
                            outputs: $outputs,
                            introduced_in: Fork::$fork,
                            block_end: flag!($($flag)?),
                        },
                    )*
                }
            }
        }
    };
}

define_opcodes! {
    0x00 => STOP, 0, 0, 0, Frontier, end;
    0x01 => ADD, 3, 2, 1, Frontier;
    0x02 => MUL, 5, 2, 1, Frontier;
    0x03 => SUB, 3, 2, 1, Frontier;
    0x04 => DIV, 5, 2, 1, Frontier;
    0x05 => SDIV, 5, 2, 1, Frontier;
    0x06 => MOD, 5, 2, 1, Frontier;
    0x07 => SMOD, 5, 2, 1, Frontier;
    0x08 => ADDMOD, 8, 3, 1, Frontier;
    0x09 => MULMOD, 8, 3, 1, Frontier;
    0x0A => EXP, 10, 2, 1, Frontier;
    0x0B => SIGNEXTEND, 5, 2, 1, Frontier;

    0x10 => LT, 3, 2, 1, Frontier;
    0x11 => GT, 3, 2, 1, Frontier;
    0x12 => SLT, 3, 2, 1, Frontier;
    0x13 => SGT, 3, 2, 1, Frontier;
    0x14 => EQ, 3, 2, 1, Frontier;
    0x15 => ISZERO, 3, 1, 1, Frontier;
    0x16 => AND, 3, 2, 1, Frontier;
    0x17 => OR, 3, 2, 1, Frontier;
    0x18 => XOR, 3, 2, 1, Frontier;
    0x19 => NOT, 3, 1, 1, Frontier;
    0x1A => BYTE, 3, 2, 1, Frontier;
    0x1B => SHL, 3, 2, 1, Constantinople;
    0x1C => SHR, 3, 2, 1, Constantinople;
    0x1D => SAR, 3, 2, 1, Constantinople;

    0x20 => KECCAK256, 30, 2, 1, Frontier;

    0x30 => ADDRESS, 2, 0, 1, Frontier;
    0x31 => BALANCE, 0, 1, 1, Frontier;
    0x32 => ORIGIN, 2, 0, 1, Frontier;
    0x33 => CALLER, 2, 0, 1, Frontier;
    0x34 => CALLVALUE, 2, 0, 1, Frontier;
    0x35 => CALLDATALOAD, 3, 1, 1, Frontier;
    0x36 => CALLDATASIZE, 2, 0, 1, Frontier;
    0x37 => CALLDATACOPY, 3, 3, 0, Frontier;
    0x38 => CODESIZE, 2, 0, 1, Frontier;
    0x39 => CODECOPY, 3, 3, 0, Frontier;
    0x3A => GASPRICE, 2, 0, 1, Frontier;
    0x3B => EXTCODESIZE, 0, 1, 1, Frontier;
    0x3C => EXTCODECOPY, 0, 4, 0, Frontier;
    0x3D => RETURNDATASIZE, 2, 0, 1, Byzantium;
    0x3E => RETURNDATACOPY, 3, 3, 0, Byzantium;
    0x3F => EXTCODEHASH, 0, 1, 1, Constantinople;

    0x40 => BLOCKHASH, 20, 1, 1, Frontier;
    0x41 => COINBASE, 2, 0, 1, Frontier;
    0x42 => TIMESTAMP, 2, 0, 1, Frontier;
    0x43 => NUMBER, 2, 0, 1, Frontier;
    0x44 => PREVRANDAO, 2, 0, 1, Frontier;
    0x45 => GASLIMIT, 2, 0, 1, Frontier;
    0x46 => CHAINID, 2, 0, 1, Istanbul;
    0x47 => SELFBALANCE, 5, 0, 1, Istanbul;
    0x48 => BASEFEE, 2, 0, 1, London;
    0x49 => BLOBHASH, 3, 1, 1, Cancun;
    0x4A => BLOBBASEFEE, 2, 0, 1, Cancun;

    0x50 => POP, 2, 1, 0, Frontier;
    0x51 => MLOAD, 3, 1, 1, Frontier;
    0x52 => MSTORE, 3, 2, 0, Frontier;
    0x53 => MSTORE8, 3, 2, 0, Frontier;
    0x54 => SLOAD, 0, 1, 1, Frontier;
    0x55 => SSTORE, 0, 2, 0, Frontier;
    0x56 => JUMP, 8, 1, 0, Frontier, end;
    0x57 => JUMPI, 10, 2, 0, Frontier, end;
    0x58 => PC, 2, 0, 1, Frontier;
    0x59 => MSIZE, 2, 0, 1, Frontier;
    0x5A => GAS, 2, 0, 1, Frontier;
    0x5B => JUMPDEST, 1, 0, 0, Frontier;
    0x5C => TLOAD, 100, 1, 1, Cancun;
    0x5D => TSTORE, 100, 2, 0, Cancun;
    0x5E => MCOPY, 3, 3, 0, Cancun;
    0x5F => PUSH0, 2, 0, 1, Shanghai;

    0x60 => PUSH1, 3, 0, 1, Frontier;
    0x61 => PUSH2, 3, 0, 1, Frontier;
    0x62 => PUSH3, 3, 0, 1, Frontier;
    0x63 => PUSH4, 3, 0, 1, Frontier;
    0x64 => PUSH5, 3, 0, 1, Frontier;
    0x65 => PUSH6, 3, 0, 1, Frontier;
    0x66 => PUSH7, 3, 0, 1, Frontier;
    0x67 => PUSH8, 3, 0, 1, Frontier;
    0x68 => PUSH9, 3, 0, 1, Frontier;
    0x69 => PUSH10, 3, 0, 1, Frontier;
    0x6A => PUSH11, 3, 0, 1, Frontier;
    0x6B => PUSH12, 3, 0, 1, Frontier;
    0x6C => PUSH13, 3, 0, 1, Frontier;
    0x6D => PUSH14, 3, 0, 1, Frontier;
    0x6E => PUSH15, 3, 0, 1, Frontier;
    0x6F => PUSH16, 3, 0, 1, Frontier;
    0x70 => PUSH17, 3, 0, 1, Frontier;
    0x71 => PUSH18, 3, 0, 1, Frontier;
    0x72 => PUSH19, 3, 0, 1, Frontier;
    0x73 => PUSH20, 3, 0, 1, Frontier;
    0x74 => PUSH21, 3, 0, 1, Frontier;
    0x75 => PUSH22, 3, 0, 1, Frontier;
    0x76 => PUSH23, 3, 0, 1, Frontier;
    0x77 => PUSH24, 3, 0, 1, Frontier;
    0x78 => PUSH25, 3, 0, 1, Frontier;
    0x79 => PUSH26, 3, 0, 1, Frontier;
    0x7A => PUSH27, 3, 0, 1, Frontier;
    0x7B => PUSH28, 3, 0, 1, Frontier;
    0x7C => PUSH29, 3, 0, 1, Frontier;
    0x7D => PUSH30, 3, 0, 1, Frontier;
    0x7E => PUSH31, 3, 0, 1, Frontier;
    0x7F => PUSH32, 3, 0, 1, Frontier;

    0x80 => DUP1, 3, 1, 2, Frontier;
    0x81 => DUP2, 3, 2, 3, Frontier;
    0x82 => DUP3, 3, 3, 4, Frontier;
    0x83 => DUP4, 3, 4, 5, Frontier;
    0x84 => DUP5, 3, 5, 6, Frontier;
    0x85 => DUP6, 3, 6, 7, Frontier;
    0x86 => DUP7, 3, 7, 8, Frontier;
    0x87 => DUP8, 3, 8, 9, Frontier;
    0x88 => DUP9, 3, 9, 10, Frontier;
    0x89 => DUP10, 3, 10, 11, Frontier;
    0x8A => DUP11, 3, 11, 12, Frontier;
    0x8B => DUP12, 3, 12, 13, Frontier;
    0x8C => DUP13, 3, 13, 14, Frontier;
    0x8D => DUP14, 3, 14, 15, Frontier;
    0x8E => DUP15, 3, 15, 16, Frontier;
    0x8F => DUP16, 3, 16, 17, Frontier;

    0x90 => SWAP1, 3, 2, 2, Frontier;
    0x91 => SWAP2, 3, 3, 3, Frontier;
    0x92 => SWAP3, 3, 4, 4, Frontier;
    0x93 => SWAP4, 3, 5, 5, Frontier;
    0x94 => SWAP5, 3, 6, 6, Frontier;
    0x95 => SWAP6, 3, 7, 7, Frontier;
    0x96 => SWAP7, 3, 8, 8, Frontier;
    0x97 => SWAP8, 3, 9, 9, Frontier;
    0x98 => SWAP9, 3, 10, 10, Frontier;
    0x99 => SWAP10, 3, 11, 11, Frontier;
    0x9A => SWAP11, 3, 12, 12, Frontier;
    0x9B => SWAP12, 3, 13, 13, Frontier;
    0x9C => SWAP13, 3, 14, 14, Frontier;
    0x9D => SWAP14, 3, 15, 15, Frontier;
    0x9E => SWAP15, 3, 16, 16, Frontier;
    0x9F => SWAP16, 3, 17, 17, Frontier;

    0xA0 => LOG0, 375, 2, 0, Frontier;
    0xA1 => LOG1, 375, 3, 0, Frontier;
    0xA2 => LOG2, 375, 4, 0, Frontier;
    0xA3 => LOG3, 375, 5, 0, Frontier;
    0xA4 => LOG4, 375, 6, 0, Frontier;

    0xF0 => CREATE, 32000, 3, 1, Frontier;
    0xF1 => CALL, 0, 7, 1, Frontier;
    0xF2 => CALLCODE, 0, 7, 1, Frontier;
    0xF3 => RETURN, 0, 2, 0, Frontier, end;
    0xF4 => DELEGATECALL, 0, 6, 1, Homestead;
    0xF5 => CREATE2, 32000, 4, 1, Constantinople;
    0xFA => STATICCALL, 0, 6, 1, Byzantium;
    0xFD => REVERT, 0, 2, 0, Byzantium, end;
    0xFE => INVALID, 0, 0, 0, Frontier, end;
    0xFF => SELFDESTRUCT, 0, 1, 0, Frontier, end;
}

impl Opcode {
    #[allow(clippy::as_conversions)]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Mnemonic as printed by tracers.
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Decode a byte under a specific fork. Bytes that are unassigned, or
    /// assigned only in a later fork, decode to `None`.
    pub fn from_byte_for_fork(byte: u8, fork: Fork) -> Option<Self> {
        let opcode = Self::from_byte(byte)?;
        (opcode.info().introduced_in <= fork).then_some(opcode)
    }

    /// Number of immediate data bytes following the opcode (PUSH1..PUSH32).
    pub fn immediate_size(self) -> usize {
        let byte = self.as_u8();
        if matches!(byte, 0x60..=0x7F) {
            usize::from(byte.wrapping_sub(0x5F))
        } else {
            0
        }
    }

    pub fn is_push_with_immediate(self) -> bool {
        self.immediate_size() > 0
    }

    /// DUP1..DUP16 depth (1-based), 0 otherwise.
    pub fn dup_depth(self) -> usize {
        let byte = self.as_u8();
        if matches!(byte, 0x80..=0x8F) {
            usize::from(byte.wrapping_sub(0x7F))
        } else {
            0
        }
    }

    /// SWAP1..SWAP16 depth (1-based), 0 otherwise.
    pub fn swap_depth(self) -> usize {
        let byte = self.as_u8();
        if matches!(byte, 0x90..=0x9F) {
            usize::from(byte.wrapping_sub(0x8F))
        } else {
            0
        }
    }

    /// LOG0..LOG4 topic count, 0 otherwise.
    pub fn log_topic_count(self) -> usize {
        let byte = self.as_u8();
        if matches!(byte, 0xA0..=0xA4) {
            usize::from(byte.wrapping_sub(0xA0))
        } else {
            0
        }
    }

    /// Opcodes that read the frame's true remaining gas mid-block and
    /// therefore receive a pre-charge correction from the analyzer: GAS,
    /// the CALL family, the CREATE family, and SSTORE (EIP-2200 sentry).
    pub const fn needs_gas_correction(self) -> bool {
        matches!(
            self,
            Opcode::GAS
                | Opcode::CALL
                | Opcode::CALLCODE
                | Opcode::DELEGATECALL
                | Opcode::STATICCALL
                | Opcode::CREATE
                | Opcode::CREATE2
                | Opcode::SSTORE
        )
    }
}
