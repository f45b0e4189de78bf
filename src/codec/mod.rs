//! Byte-buffer codec
//!
//! This module provides the primitives every consensus encoding is built on:
//! - Fixed-size buffers (`FixedBuf<N>`) with hex/base58/base64 conversion
//! - Minimal-length variable integers (`VarInt`)
//! - A cursor reader (`BufReader`) and an accumulating writer (`BufWriter`)
//!
//! All integers are big-endian.

pub mod buf_reader;
pub mod buf_writer;
pub mod error;
pub mod fixed_buf;
pub mod var_int;

pub use buf_reader::BufReader;
pub use buf_writer::BufWriter;
pub use error::BufError;
pub use fixed_buf::{Buf32, FixedBuf};
pub use var_int::VarInt;

use base64::{engine::general_purpose, Engine as _};

/// Allocate a zeroed buffer of `len` bytes
pub fn alloc(len: usize) -> Vec<u8> {
    vec![0u8; len]
}

/// Allocate a buffer of `len` bytes filled with `byte`
pub fn fill(len: usize, byte: u8) -> Vec<u8> {
    vec![byte; len]
}

/// Concatenate buffers in order
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let total = parts.iter().map(|p| p.len()).sum();
    let mut out = Vec::with_capacity(total);
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Borrow `len` bytes starting at `start`, failing instead of panicking
pub fn slice(buf: &[u8], start: usize, len: usize) -> Result<&[u8], BufError> {
    let end = start.checked_add(len).ok_or(BufError::NotEnoughData {
        needed: len,
        remaining: buf.len().saturating_sub(start),
    })?;
    buf.get(start..end).ok_or(BufError::NotEnoughData {
        needed: len,
        remaining: buf.len().saturating_sub(start),
    })
}

pub fn to_hex(buf: &[u8]) -> String {
    hex::encode(buf)
}

pub fn from_hex(s: &str) -> Result<Vec<u8>, BufError> {
    hex::decode(s).map_err(|_| BufError::InvalidHex)
}

pub fn to_base58(buf: &[u8]) -> String {
    bs58::encode(buf).into_string()
}

pub fn from_base58(s: &str) -> Result<Vec<u8>, BufError> {
    bs58::decode(s).into_vec().map_err(|_| BufError::InvalidBase58)
}

pub fn to_base64(buf: &[u8]) -> String {
    general_purpose::STANDARD.encode(buf)
}

pub fn from_base64(s: &str) -> Result<Vec<u8>, BufError> {
    general_purpose::STANDARD
        .decode(s)
        .map_err(|_| BufError::InvalidBase64)
}
