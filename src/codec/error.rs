//! Decode and conversion errors for the byte-buffer codec

use thiserror::Error;

/// Errors raised while reading, writing or converting byte buffers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufError {
    #[error("Not enough data: needed {needed} bytes, {remaining} remaining")]
    NotEnoughData { needed: usize, remaining: usize },
    #[error("Non-minimal VarInt encoding")]
    NonMinimalVarInt,
    #[error("Invalid buffer size: expected {expected} bytes, got {actual}")]
    InvalidSize { expected: usize, actual: usize },
    #[error("Trailing bytes after decode: {0}")]
    TrailingBytes(usize),
    #[error("Invalid hex string")]
    InvalidHex,
    #[error("Invalid base58 string")]
    InvalidBase58,
    #[error("Invalid base64 string")]
    InvalidBase64,
    #[error("Too many {what}: {count} (max: {max})")]
    TooMany {
        what: &'static str,
        count: u64,
        max: u64,
    },
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}
