//! Fixed-size byte buffers
//!
//! `FixedBuf<N>` owns exactly `N` bytes. Construction from a slice of any
//! other length fails, so a value of this type always has its declared size.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::BufError;

/// An owned byte array of exactly `N` bytes
///
/// Ordering is lexicographic over the bytes, which is the same as comparing
/// the buffers as big-endian unsigned integers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedBuf<const N: usize>([u8; N]);

/// 32-byte buffer used for ids, hashes, targets and nonces
pub type Buf32 = FixedBuf<32>;

impl<const N: usize> FixedBuf<N> {
    pub const SIZE: usize = N;

    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// All-zero buffer
    pub const fn zero() -> Self {
        Self([0u8; N])
    }

    /// Buffer with every byte set to `byte`
    pub const fn filled(byte: u8) -> Self {
        Self([byte; N])
    }

    /// Copy a slice into a fixed buffer, failing on length mismatch
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BufError> {
        let arr: [u8; N] = bytes.try_into().map_err(|_| BufError::InvalidSize {
            expected: N,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Cryptographically random buffer from the OS RNG
    pub fn random() -> Self {
        let mut bytes = [0u8; N];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> [u8; N] {
        self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, BufError> {
        Self::from_slice(&super::from_hex(s)?)
    }

    pub fn to_base58(&self) -> String {
        super::to_base58(&self.0)
    }

    pub fn from_base58(s: &str) -> Result<Self, BufError> {
        Self::from_slice(&super::from_base58(s)?)
    }

    pub fn to_base64(&self) -> String {
        super::to_base64(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, BufError> {
        Self::from_slice(&super::from_base64(s)?)
    }

    /// Copy with the byte order reversed
    pub fn reversed(&self) -> Self {
        let mut bytes = self.0;
        bytes.reverse();
        Self(bytes)
    }
}

impl<const N: usize> Default for FixedBuf<N> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const N: usize> From<[u8; N]> for FixedBuf<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for FixedBuf<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> fmt::Debug for FixedBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedBuf<{}>({})", N, self.to_hex())
    }
}

impl<const N: usize> fmt::Display for FixedBuf<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Serialized as lowercase hex so JSON stays readable.
impl<const N: usize> Serialize for FixedBuf<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedBuf<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_rejects_wrong_size() {
        assert!(Buf32::from_slice(&[0u8; 32]).is_ok());
        assert_eq!(
            Buf32::from_slice(&[0u8; 31]),
            Err(BufError::InvalidSize {
                expected: 32,
                actual: 31
            })
        );
        assert!(FixedBuf::<4>::from_hex("0102030405").is_err());
    }

    #[test]
    fn test_text_roundtrip() {
        let buf = Buf32::random();
        assert_eq!(Buf32::from_hex(&buf.to_hex()).unwrap(), buf);
        assert_eq!(Buf32::from_base58(&buf.to_base58()).unwrap(), buf);
        assert_eq!(Buf32::from_base64(&buf.to_base64()).unwrap(), buf);
    }

    #[test]
    fn test_ordering_is_big_endian() {
        let mut low = [0u8; 32];
        low[31] = 0xFF;
        let mut high = [0u8; 32];
        high[0] = 0x01;
        assert!(Buf32::new(low) < Buf32::new(high));
    }

    #[test]
    fn test_zero_and_random() {
        assert!(Buf32::zero().is_zero());
        assert!(!Buf32::filled(1).is_zero());
        assert_ne!(Buf32::random(), Buf32::random());
    }

    #[test]
    fn test_serde_as_hex() {
        let buf = FixedBuf::<2>::new([0xAB, 0xCD]);
        let json = serde_json::to_string(&buf).unwrap();
        assert_eq!(json, "\"abcd\"");
        let back: FixedBuf<2> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, buf);
        assert!(serde_json::from_str::<FixedBuf<3>>(&json).is_err());
    }
}
