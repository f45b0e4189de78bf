//! Cursor reader over a borrowed byte slice

use super::error::BufError;
use super::fixed_buf::FixedBuf;
use super::var_int::VarInt;

/// Reads big-endian values from a byte slice, advancing a cursor
///
/// Every read checks the remaining length first; running past the end
/// yields `BufError::NotEnoughData` and leaves the cursor untouched.
#[derive(Debug, Clone)]
pub struct BufReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Borrow the next `len` bytes
    pub fn read(&mut self, len: usize) -> Result<&'a [u8], BufError> {
        if len > self.remaining() {
            return Err(BufError::NotEnoughData {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_fixed<const N: usize>(&mut self) -> Result<FixedBuf<N>, BufError> {
        FixedBuf::from_slice(self.read(N)?)
    }

    pub fn read_u8(&mut self) -> Result<u8, BufError> {
        Ok(self.read_fixed::<1>()?.as_bytes()[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16, BufError> {
        Ok(u16::from_be_bytes(self.read_fixed::<2>()?.into_inner()))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, BufError> {
        Ok(u32::from_be_bytes(self.read_fixed::<4>()?.into_inner()))
    }

    pub fn read_u64_be(&mut self) -> Result<u64, BufError> {
        Ok(u64::from_be_bytes(self.read_fixed::<8>()?.into_inner()))
    }

    pub fn read_var_int(&mut self) -> Result<u64, BufError> {
        Ok(VarInt::from_reader(self)?.value())
    }

    /// Read a VarInt length prefix followed by that many bytes
    pub fn read_var_bytes(&mut self) -> Result<Vec<u8>, BufError> {
        let len = self.read_var_int()?;
        if len > self.remaining() as u64 {
            return Err(BufError::NotEnoughData {
                needed: usize::try_from(len).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        Ok(self.read(len as usize)?.to_vec())
    }

    /// Read a VarInt element count for items at least `min_item_len` bytes long
    ///
    /// Fails before any allocation when the count cannot possibly fit in the
    /// remaining input.
    pub fn read_count(&mut self, min_item_len: usize) -> Result<usize, BufError> {
        let count = self.read_var_int()?;
        let needed = count.saturating_mul(min_item_len.max(1) as u64);
        if needed > self.remaining() as u64 {
            return Err(BufError::NotEnoughData {
                needed: usize::try_from(needed).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        Ok(count as usize)
    }

    /// Succeeds only when all input has been consumed
    pub fn finish(&self) -> Result<(), BufError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(BufError::TrailingBytes(n)),
        }
    }
}
