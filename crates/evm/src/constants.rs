//! Protocol constants shared across the engine.

/// Maximum number of words the stack may hold.
pub const STACK_LIMIT: usize = 1024;

/// Word width in bytes.
pub const WORD_SIZE: usize = 32;

/// Maximum call/create nesting depth.
pub const CALL_DEPTH_LIMIT: usize = 1024;

/// Gas handed to the callee of a value-bearing CALL on top of the
/// forwarded gas, so trivial recipients can run.
pub const CALL_STIPEND: u64 = 2300;

/// Minimum gas that must remain for SSTORE to proceed (EIP-2200 sentry).
pub const SSTORE_SENTRY: u64 = 2300;

/// EIP-170 deployed-code size cap (Spurious Dragon onward).
pub const MAX_CODE_SIZE: usize = 24576;

/// EIP-3860 init-code size cap (Shanghai onward).
pub const MAX_INITCODE_SIZE: usize = 2 * MAX_CODE_SIZE;

/// Gas charged per byte of deployed code at the end of a create.
pub const CODE_DEPOSIT_COST_PER_BYTE: u64 = 200;

/// EIP-3541: deployed code may not start with this byte (London onward).
pub const EOF_PREFIX: u8 = 0xEF;

/// BLOCKHASH serves only the most recent 256 blocks.
pub const BLOCKHASH_WINDOW: u64 = 256;

/// Divisor of the gas retained by the caller under EIP-150.
pub const GAS_RETENTION_DIVISOR: u64 = 64;

/// Refund cap divisor, London onward (EIP-3529).
pub const REFUND_QUOTIENT_LONDON: u64 = 5;

/// Refund cap divisor before London.
pub const REFUND_QUOTIENT_FRONTIER: u64 = 2;
