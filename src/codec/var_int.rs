//! Minimal-length variable integers
//!
//! Values below 0xFD take one byte. Larger values are prefixed with
//! 0xFD (u16), 0xFE (u32) or 0xFF (u64), payload big-endian. A prefix wider
//! than the value needs is rejected on read.

use super::buf_reader::BufReader;
use super::error::BufError;

const PREFIX_U16: u8 = 0xFD;
const PREFIX_U32: u8 = 0xFE;
const PREFIX_U64: u8 = 0xFF;

/// A canonical variable-length unsigned integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VarInt(pub u64);

impl VarInt {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Encoded length in bytes
    pub fn encoded_len(&self) -> usize {
        match self.0 {
            0..=0xFC => 1,
            0xFD..=0xFFFF => 3,
            0x1_0000..=0xFFFF_FFFF => 5,
            _ => 9,
        }
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let n = self.0;
        let mut out = Vec::with_capacity(self.encoded_len());
        match n {
            0..=0xFC => out.push(n as u8),
            0xFD..=0xFFFF => {
                out.push(PREFIX_U16);
                out.extend_from_slice(&(n as u16).to_be_bytes());
            }
            0x1_0000..=0xFFFF_FFFF => {
                out.push(PREFIX_U32);
                out.extend_from_slice(&(n as u32).to_be_bytes());
            }
            _ => {
                out.push(PREFIX_U64);
                out.extend_from_slice(&n.to_be_bytes());
            }
        }
        out
    }

    /// Decode a buffer holding exactly one VarInt
    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut reader = BufReader::new(buf);
        let v = Self::from_reader(&mut reader)?;
        reader.finish()?;
        Ok(v)
    }

    /// Read one VarInt from the cursor, rejecting non-minimal encodings
    pub fn from_reader(reader: &mut BufReader<'_>) -> Result<Self, BufError> {
        let first = reader.read_u8()?;
        let value = match first {
            PREFIX_U16 => {
                let v = reader.read_u16_be()? as u64;
                if v < 0xFD {
                    return Err(BufError::NonMinimalVarInt);
                }
                v
            }
            PREFIX_U32 => {
                let v = reader.read_u32_be()? as u64;
                if v <= 0xFFFF {
                    return Err(BufError::NonMinimalVarInt);
                }
                v
            }
            PREFIX_U64 => {
                let v = reader.read_u64_be()?;
                if v <= 0xFFFF_FFFF {
                    return Err(BufError::NonMinimalVarInt);
                }
                v
            }
            small => small as u64,
        };
        Ok(Self(value))
    }
}

impl From<u64> for VarInt {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<usize> for VarInt {
    fn from(value: usize) -> Self {
        Self(value as u64)
    }
}
