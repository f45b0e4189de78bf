//! Script errors

use thiserror::Error;

/// Reasons a script fails to parse or evaluate
///
/// Evaluation errors never escape the interpreter: `eval` collapses them to
/// `false` and keeps the message for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Truncated push data: opcode 0x{0:02x}")]
    TruncatedPushData(u8),
    #[error("Invalid script asm: {0}")]
    InvalidAsm(String),
    #[error("Unlock script is not push-only")]
    UnlockNotPushOnly,
    #[error("Disabled opcode: 0x{0:02x}")]
    DisabledOpcode(u8),
    #[error("Unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow: {0} items")]
    StackOverflow(usize),
    #[error("Stack element too large: {0} bytes")]
    ElementTooLarge(usize),
    #[error("Too many operations")]
    TooManyOps,
    #[error("Unbalanced conditional")]
    UnbalancedConditional,
    #[error("{0} failed")]
    VerifyFailed(&'static str),
    #[error("OP_RETURN executed")]
    OpReturn,
    #[error("Number too long: {0} bytes")]
    NumberTooLong(usize),
    #[error("Numeric overflow")]
    NumberOverflow,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Invalid range for {0}")]
    InvalidRange(&'static str),
    #[error("Operands of different sizes")]
    OperandSizeMismatch,
    #[error("Invalid signature encoding")]
    InvalidSignatureEncoding,
    #[error("Invalid public key encoding")]
    InvalidPubKeyEncoding,
    #[error("Invalid key or signature count")]
    InvalidMultisigCount,
    #[error("Negative lock value")]
    NegativeLock,
    #[error("Absolute lock not reached")]
    LockAbsNotReached,
    #[error("Relative lock not reached")]
    LockRelNotReached,
    #[error("Input index {0} out of range")]
    InputIndexOutOfRange(usize),
    #[error("Final stack must hold exactly one item, found {0}")]
    DirtyStack(usize),
    #[error("Script evaluated to false")]
    FalseResult,
}
