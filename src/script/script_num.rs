//! Script numbers
//!
//! Minimal-length, signed, big-endian two's-complement integers. Zero is the
//! empty buffer; the sign is the high bit of the first byte; a leading 0x00
//! or 0xFF is kept only when dropping it would flip the sign.

use std::fmt;

use super::error::ScriptError;

/// Longest accepted numeric operand
pub const MAX_SCRIPT_NUM_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScriptNum(pub i128);

impl ScriptNum {
    pub fn new(n: i128) -> Self {
        Self(n)
    }

    pub fn value(&self) -> i128 {
        self.0
    }

    pub fn to_buf(&self) -> Vec<u8> {
        if self.0 == 0 {
            return Vec::new();
        }
        minimize(&self.0.to_be_bytes())
    }

    /// Decode an operand of at most 16 bytes
    ///
    /// Non-minimal input is accepted and sign-extended.
    pub fn from_buf(buf: &[u8]) -> Result<Self, ScriptError> {
        if buf.len() > MAX_SCRIPT_NUM_LEN {
            return Err(ScriptError::NumberTooLong(buf.len()));
        }
        let Some(first) = buf.first() else {
            return Ok(Self(0));
        };
        let fill = if first & 0x80 != 0 { 0xFF } else { 0x00 };
        let mut bytes = [fill; 16];
        bytes[16 - buf.len()..].copy_from_slice(buf);
        Ok(Self(i128::from_be_bytes(bytes)))
    }

    /// True when `buf` is exactly the canonical encoding of its value
    pub fn is_minimal(buf: &[u8]) -> bool {
        match Self::from_buf(buf) {
            Ok(n) => n.to_buf() == buf,
            Err(_) => false,
        }
    }

    /// Encode sign-extended into exactly `size` bytes
    pub fn to_buf_padded(&self, size: usize) -> Result<Vec<u8>, ScriptError> {
        let minimal = self.to_buf();
        if size < minimal.len() {
            return Err(ScriptError::InvalidRange("NUM2BIN"));
        }
        let fill = if self.0 < 0 { 0xFF } else { 0x00 };
        let mut out = vec![fill; size - minimal.len()];
        out.extend_from_slice(&minimal);
        Ok(out)
    }

    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, ScriptError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(ScriptError::NumberOverflow)
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, ScriptError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(ScriptError::NumberOverflow)
    }

    pub fn checked_mul(self, rhs: Self) -> Result<Self, ScriptError> {
        self.0
            .checked_mul(rhs.0)
            .map(Self)
            .ok_or(ScriptError::NumberOverflow)
    }

    /// Truncating division
    pub fn checked_div(self, rhs: Self) -> Result<Self, ScriptError> {
        if rhs.0 == 0 {
            return Err(ScriptError::DivisionByZero);
        }
        self.0
            .checked_div(rhs.0)
            .map(Self)
            .ok_or(ScriptError::NumberOverflow)
    }

    /// Remainder with the sign of the dividend
    pub fn checked_rem(self, rhs: Self) -> Result<Self, ScriptError> {
        if rhs.0 == 0 {
            return Err(ScriptError::DivisionByZero);
        }
        self.0
            .checked_rem(rhs.0)
            .map(Self)
            .ok_or(ScriptError::NumberOverflow)
    }

    pub fn checked_neg(self) -> Result<Self, ScriptError> {
        self.0
            .checked_neg()
            .map(Self)
            .ok_or(ScriptError::NumberOverflow)
    }

    pub fn checked_abs(self) -> Result<Self, ScriptError> {
        self.0
            .checked_abs()
            .map(Self)
            .ok_or(ScriptError::NumberOverflow)
    }
}

impl From<i128> for ScriptNum {
    fn from(n: i128) -> Self {
        Self(n)
    }
}

impl From<u64> for ScriptNum {
    fn from(n: u64) -> Self {
        Self(n as i128)
    }
}

impl From<bool> for ScriptNum {
    fn from(b: bool) -> Self {
        Self(i128::from(b))
    }
}

impl fmt::Display for ScriptNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strip redundant sign-extension bytes from a two's-complement buffer
///
/// An all-zero buffer reduces to the empty buffer.
pub fn minimize(buf: &[u8]) -> Vec<u8> {
    let mut start = 0;
    while start + 1 < buf.len() {
        let (b, next) = (buf[start], buf[start + 1]);
        if (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    let rest = &buf[start..];
    if rest == [0x00] {
        Vec::new()
    } else {
        rest.to_vec()
    }
}

/// Truthiness of a stack element: any nonzero byte
pub fn is_truthy(buf: &[u8]) -> bool {
    buf.iter().any(|b| *b != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encoding_examples() {
        assert_eq!(ScriptNum(0).to_buf(), Vec::<u8>::new());
        assert_eq!(ScriptNum(1).to_buf(), vec![0x01]);
        assert_eq!(ScriptNum(127).to_buf(), vec![0x7F]);
        assert_eq!(ScriptNum(128).to_buf(), vec![0x00, 0x80]);
        assert_eq!(ScriptNum(255).to_buf(), vec![0x00, 0xFF]);
        assert_eq!(ScriptNum(256).to_buf(), vec![0x01, 0x00]);
        assert_eq!(ScriptNum(-1).to_buf(), vec![0xFF]);
        assert_eq!(ScriptNum(-128).to_buf(), vec![0x80]);
        assert_eq!(ScriptNum(-129).to_buf(), vec![0xFF, 0x7F]);
        assert_eq!(ScriptNum(i128::MIN).to_buf().len(), 16);
    }

    #[test]
    fn test_decoding_sign_extends() {
        assert_eq!(ScriptNum::from_buf(&[]).unwrap(), ScriptNum(0));
        assert_eq!(ScriptNum::from_buf(&[0x80]).unwrap(), ScriptNum(-128));
        assert_eq!(ScriptNum::from_buf(&[0x00, 0x80]).unwrap(), ScriptNum(128));
        assert_eq!(ScriptNum::from_buf(&[0xFF, 0xFF]).unwrap(), ScriptNum(-1));
        assert!(ScriptNum::from_buf(&[0u8; 17]).is_err());
    }

    #[test]
    fn test_minimality() {
        assert!(ScriptNum::is_minimal(&[]));
        assert!(ScriptNum::is_minimal(&[0x00, 0x80]));
        assert!(!ScriptNum::is_minimal(&[0x00]));
        assert!(!ScriptNum::is_minimal(&[0x00, 0x01]));
        assert!(!ScriptNum::is_minimal(&[0xFF, 0xFF]));
        assert_eq!(minimize(&[0xFF, 0xFF, 0x80]), vec![0x80]);
        assert_eq!(minimize(&[0x00, 0x00]), Vec::<u8>::new());
    }

    #[test]
    fn test_padded() {
        assert_eq!(ScriptNum(1).to_buf_padded(3).unwrap(), vec![0, 0, 1]);
        assert_eq!(ScriptNum(-1).to_buf_padded(2).unwrap(), vec![0xFF, 0xFF]);
        assert!(ScriptNum(256).to_buf_padded(1).is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(ScriptNum(7).checked_div(ScriptNum(-2)).unwrap(), ScriptNum(-3));
        assert_eq!(ScriptNum(-7).checked_rem(ScriptNum(2)).unwrap(), ScriptNum(-1));
        assert_eq!(
            ScriptNum(1).checked_div(ScriptNum(0)),
            Err(ScriptError::DivisionByZero)
        );
        assert_eq!(
            ScriptNum(i128::MAX).checked_add(ScriptNum(1)),
            Err(ScriptError::NumberOverflow)
        );
        assert!(ScriptNum(i128::MIN).checked_abs().is_err());
    }

    #[test]
    fn test_truthy() {
        assert!(!is_truthy(&[]));
        assert!(!is_truthy(&[0, 0]));
        assert!(is_truthy(&[0, 1]));
        assert!(is_truthy(&[0x80]));
    }

    proptest! {
        #[test]
        fn test_prop_roundtrip(n in any::<i128>()) {
            let buf = ScriptNum(n).to_buf();
            prop_assert!(buf.len() <= MAX_SCRIPT_NUM_LEN);
            prop_assert_eq!(ScriptNum::from_buf(&buf).unwrap(), ScriptNum(n));
            prop_assert!(ScriptNum::is_minimal(&buf));
        }
    }
}
