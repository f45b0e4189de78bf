//! Accumulating writer that concatenates its parts on finalize

use super::fixed_buf::FixedBuf;
use super::var_int::VarInt;

/// Collects byte chunks and joins them once in `to_buf`
#[derive(Debug, Clone, Default)]
pub struct BufWriter {
    parts: Vec<Vec<u8>>,
    len: usize,
}

impl BufWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn write(&mut self, bytes: &[u8]) -> &mut Self {
        self.len += bytes.len();
        self.parts.push(bytes.to_vec());
        self
    }

    pub fn write_fixed<const N: usize>(&mut self, buf: &FixedBuf<N>) -> &mut Self {
        self.write(buf.as_slice())
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.write(&[v])
    }

    pub fn write_u16_be(&mut self, v: u16) -> &mut Self {
        self.write(&v.to_be_bytes())
    }

    pub fn write_u32_be(&mut self, v: u32) -> &mut Self {
        self.write(&v.to_be_bytes())
    }

    pub fn write_u64_be(&mut self, v: u64) -> &mut Self {
        self.write(&v.to_be_bytes())
    }

    pub fn write_var_int(&mut self, v: u64) -> &mut Self {
        self.write(&VarInt(v).to_buf())
    }

    /// VarInt length prefix followed by the bytes
    pub fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_var_int(bytes.len() as u64).write(bytes)
    }

    /// Concatenate everything written so far
    pub fn to_buf(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for part in &self.parts {
            out.extend_from_slice(part);
        }
        out
    }
}
