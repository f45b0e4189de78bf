//! Script representation
//!
//! A script is a sequence of chunks, each an opcode byte with optional push
//! data. Binary form is the usual opcode stream with big-endian PUSHDATA
//! lengths; text form (ASM) is space-separated `OP_` names and hex data.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::ScriptError;
use super::opcode::{is_push_opcode, Opcode, MAX_DIRECT_PUSH};
use super::script_num::ScriptNum;
use crate::codec::{self, BufReader, Buf32};

/// One opcode and, for data pushes, the bytes it pushes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptChunk {
    pub opcode: u8,
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    pub fn op(opcode: Opcode) -> Self {
        Self {
            opcode: opcode as u8,
            data: None,
        }
    }

    /// Smallest push that places `data` on the stack
    pub fn push(data: &[u8]) -> Self {
        let opcode = match data.len() {
            0 => return Self::op(Opcode::Op0),
            n if n <= MAX_DIRECT_PUSH as usize => n as u8,
            n if n <= 0xFF => Opcode::PushData1 as u8,
            n if n <= 0xFFFF => Opcode::PushData2 as u8,
            _ => Opcode::PushData4 as u8,
        };
        Self {
            opcode,
            data: Some(data.to_vec()),
        }
    }

    /// Push a number, using OP_0..OP_16 and OP_1NEGATE where possible
    pub fn push_num(n: ScriptNum) -> Self {
        match n.value() {
            -1 => Self::op(Opcode::Op1Negate),
            v @ 0..=16 => Opcode::small_int(v as u8)
                .map(Self::op)
                .unwrap_or_else(|| Self::push(&n.to_buf())),
            _ => Self::push(&n.to_buf()),
        }
    }

    /// The bytes this chunk pushes, if it is a push
    pub fn push_value(&self) -> Option<Vec<u8>> {
        if let Some(data) = &self.data {
            return Some(data.clone());
        }
        match Opcode::from_byte(self.opcode)? {
            Opcode::Op0 => Some(Vec::new()),
            Opcode::Op1Negate => Some(ScriptNum(-1).to_buf()),
            op => op.small_int_value().map(|n| vec![n]),
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.opcode);
        let Some(data) = &self.data else {
            return;
        };
        match Opcode::from_byte(self.opcode) {
            Some(Opcode::PushData1) => out.push(data.len() as u8),
            Some(Opcode::PushData2) => out.extend_from_slice(&(data.len() as u16).to_be_bytes()),
            Some(Opcode::PushData4) => out.extend_from_slice(&(data.len() as u32).to_be_bytes()),
            _ => {}
        }
        out.extend_from_slice(data);
    }

    fn read_from(reader: &mut BufReader<'_>) -> Result<Self, ScriptError> {
        let opcode = reader
            .read_u8()
            .map_err(|_| ScriptError::TruncatedPushData(0))?;
        let truncated = |_| ScriptError::TruncatedPushData(opcode);
        let len = match opcode {
            1..=MAX_DIRECT_PUSH => opcode as usize,
            b if b == Opcode::PushData1 as u8 => reader.read_u8().map_err(truncated)? as usize,
            b if b == Opcode::PushData2 as u8 => reader.read_u16_be().map_err(truncated)? as usize,
            b if b == Opcode::PushData4 as u8 => reader.read_u32_be().map_err(truncated)? as usize,
            _ => return Ok(Self { opcode, data: None }),
        };
        let data = reader.read(len).map_err(truncated)?.to_vec();
        Ok(Self {
            opcode,
            data: Some(data),
        })
    }

    fn to_asm(&self) -> String {
        if let Some(data) = &self.data {
            return hex::encode(data);
        }
        match Opcode::from_byte(self.opcode) {
            Some(op) => op.name().to_string(),
            None => format!("OP_UNKNOWN{}", self.opcode),
        }
    }
}

/// A parsed script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    pub chunks: Vec<ScriptChunk>,
}

impl Script {
    pub fn new(chunks: Vec<ScriptChunk>) -> Self {
        Self { chunks }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in &self.chunks {
            chunk.write_to(&mut out);
        }
        out
    }

    /// Parse binary script; fails only on truncated push data
    pub fn from_buf(buf: &[u8]) -> Result<Self, ScriptError> {
        let mut reader = BufReader::new(buf);
        let mut chunks = Vec::new();
        while !reader.eof() {
            chunks.push(ScriptChunk::read_from(&mut reader)?);
        }
        Ok(Self { chunks })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_buf())
    }

    pub fn from_hex(s: &str) -> Result<Self, ScriptError> {
        let buf = codec::from_hex(s).map_err(|e| ScriptError::InvalidAsm(e.to_string()))?;
        Self::from_buf(&buf)
    }

    pub fn to_asm(&self) -> String {
        self.chunks
            .iter()
            .map(ScriptChunk::to_asm)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse ASM: `OP_` names become opcodes, anything else is hex push data
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let chunks = asm
            .split_whitespace()
            .map(|token| {
                if token.starts_with("OP_") {
                    Opcode::from_name(token)
                        .map(ScriptChunk::op)
                        .ok_or_else(|| ScriptError::InvalidAsm(token.to_string()))
                } else {
                    codec::from_hex(token)
                        .map(|data| ScriptChunk::push(&data))
                        .map_err(|_| ScriptError::InvalidAsm(token.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { chunks })
    }

    /// Every chunk only pushes data
    pub fn is_push_only(&self) -> bool {
        self.chunks.iter().all(|c| is_push_opcode(c.opcode))
    }

    /// Values pushed by a push-only script, in order
    pub fn push_values(&self) -> Option<Vec<Vec<u8>>> {
        if !self.is_push_only() {
            return None;
        }
        self.chunks.iter().map(ScriptChunk::push_value).collect()
    }

    // =========================================================================
    // Standard templates
    // =========================================================================

    /// `DUP DOUBLEBLAKE3 <pkh> EQUALVERIFY CHECKSIG`
    pub fn pkh_output(pkh: &Buf32) -> Self {
        Self::new(vec![
            ScriptChunk::op(Opcode::Dup),
            ScriptChunk::op(Opcode::DoubleBlake3),
            ScriptChunk::push(pkh.as_slice()),
            ScriptChunk::op(Opcode::EqualVerify),
            ScriptChunk::op(Opcode::CheckSig),
        ])
    }

    /// `<sig> <pubkey>`
    pub fn pkh_input(sig: &[u8], pub_key: &[u8]) -> Self {
        Self::new(vec![ScriptChunk::push(sig), ScriptChunk::push(pub_key)])
    }

    /// Placeholder input with zeroed signature and key of the right sizes
    pub fn pkh_input_placeholder() -> Self {
        Self::pkh_input(&[0u8; 65], &[0u8; 33])
    }

    pub fn is_pkh_output(&self) -> Option<Buf32> {
        match self.chunks.as_slice() {
            [dup, hash, push, eqv, chk]
                if dup.opcode == Opcode::Dup as u8
                    && hash.opcode == Opcode::DoubleBlake3 as u8
                    && eqv.opcode == Opcode::EqualVerify as u8
                    && chk.opcode == Opcode::CheckSig as u8 =>
            {
                push.data.as_deref().and_then(|d| Buf32::from_slice(d).ok())
            }
            _ => None,
        }
    }

    /// Pay-to-pkh that anyone may spend once `expire_blocks` have passed:
    /// `IF DUP DOUBLEBLAKE3 <pkh> EQUALVERIFY CHECKSIG ELSE <n> CHECKLOCKRELVERIFY DROP 1 ENDIF`
    pub fn pkhx_output(pkh: &Buf32, expire_blocks: u32) -> Self {
        Self::new(vec![
            ScriptChunk::op(Opcode::If),
            ScriptChunk::op(Opcode::Dup),
            ScriptChunk::op(Opcode::DoubleBlake3),
            ScriptChunk::push(pkh.as_slice()),
            ScriptChunk::op(Opcode::EqualVerify),
            ScriptChunk::op(Opcode::CheckSig),
            ScriptChunk::op(Opcode::Else),
            ScriptChunk::push_num(ScriptNum::from(expire_blocks as u64)),
            ScriptChunk::op(Opcode::CheckLockRelVerify),
            ScriptChunk::op(Opcode::Drop),
            ScriptChunk::op(Opcode::Op1),
            ScriptChunk::op(Opcode::EndIf),
        ])
    }

    /// `<sig> <pubkey> 1`
    pub fn pkhx_input(sig: &[u8], pub_key: &[u8]) -> Self {
        Self::new(vec![
            ScriptChunk::push(sig),
            ScriptChunk::push(pub_key),
            ScriptChunk::op(Opcode::Op1),
        ])
    }

    /// `0`: takes the expiry branch
    pub fn pkhx_expired_input() -> Self {
        Self::new(vec![ScriptChunk::op(Opcode::Op0)])
    }

    pub fn is_pkhx_output(&self) -> Option<(Buf32, u32)> {
        let c = &self.chunks;
        if c.len() != 12
            || c[0].opcode != Opcode::If as u8
            || c[8].opcode != Opcode::CheckLockRelVerify as u8
            || c[11].opcode != Opcode::EndIf as u8
        {
            return None;
        }
        let pkh = Self::new(c[1..6].to_vec()).is_pkh_output()?;
        let expire = ScriptNum::from_buf(&c[7].push_value()?).ok()?;
        let expire = u32::try_from(expire.value()).ok()?;
        (Self::pkhx_output(&pkh, expire) == *self).then_some((pkh, expire))
    }

    /// Mint input: `<block_num> <mint data>`
    pub fn mint_input(block_num: u64, mint_data: &[u8]) -> Self {
        Self::new(vec![
            ScriptChunk::push(&ScriptNum::from(block_num).to_buf()),
            ScriptChunk::push(mint_data),
        ])
    }

    /// Push-only script whose first push is the canonical encoding of `block_num`
    pub fn is_mint_input_for(&self, block_num: u64) -> bool {
        match self.push_values() {
            Some(values) => values
                .first()
                .is_some_and(|first| *first == ScriptNum::from(block_num).to_buf()),
            None => false,
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_asm())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_sizes() {
        assert_eq!(ScriptChunk::push(&[]).opcode, 0x00);
        assert_eq!(ScriptChunk::push(&[1; 75]).opcode, 75);
        assert_eq!(ScriptChunk::push(&[1; 76]).opcode, Opcode::PushData1 as u8);
        assert_eq!(ScriptChunk::push(&[1; 256]).opcode, Opcode::PushData2 as u8);
        assert_eq!(
            ScriptChunk::push(&vec![1; 70_000]).opcode,
            Opcode::PushData4 as u8
        );
    }

    #[test]
    fn test_binary_roundtrip_big_endian_lengths() {
        let script = Script::new(vec![
            ScriptChunk::push(&[7; 300]),
            ScriptChunk::op(Opcode::Drop),
            ScriptChunk::op(Opcode::Op1),
        ]);
        let buf = script.to_buf();
        assert_eq!(&buf[..3], &[Opcode::PushData2 as u8, 0x01, 0x2C]);
        assert_eq!(Script::from_buf(&buf).unwrap(), script);
    }

    #[test]
    fn test_truncated_push_fails() {
        assert_eq!(
            Script::from_buf(&[0x05, 0x01, 0x02]),
            Err(ScriptError::TruncatedPushData(0x05))
        );
        assert!(Script::from_buf(&[Opcode::PushData2 as u8, 0x00]).is_err());
    }

    #[test]
    fn test_unknown_opcode_parses() {
        let script = Script::from_buf(&[0xba, 0x51]).unwrap();
        assert_eq!(script.chunks.len(), 2);
        assert_eq!(script.to_asm(), "OP_UNKNOWN186 OP_1");
    }

    #[test]
    fn test_asm_roundtrip() {
        let pkh = Buf32::filled(0x11);
        let script = Script::pkh_output(&pkh);
        let asm = script.to_asm();
        assert!(asm.starts_with("OP_DUP OP_DOUBLEBLAKE3 1111"));
        assert_eq!(Script::from_asm(&asm).unwrap(), script);
        assert!(Script::from_asm("OP_NOPE").is_err());
        assert!(Script::from_asm("zz").is_err());
    }

    #[test]
    fn test_push_only() {
        assert!(Script::pkh_input_placeholder().is_push_only());
        assert!(Script::mint_input(5, b"hi").is_push_only());
        assert!(!Script::pkh_output(&Buf32::zero()).is_push_only());
        assert!(!Script::new(vec![ScriptChunk::op(Opcode::Reserved)]).is_push_only());

        let values = Script::new(vec![
            ScriptChunk::op(Opcode::Op0),
            ScriptChunk::op(Opcode::Op1Negate),
            ScriptChunk::op(Opcode::Op16),
        ])
        .push_values()
        .unwrap();
        assert_eq!(values, vec![vec![], vec![0xFF], vec![16]]);
    }

    #[test]
    fn test_templates_detected() {
        let pkh = Buf32::filled(0x22);
        assert_eq!(Script::pkh_output(&pkh).is_pkh_output(), Some(pkh));
        assert_eq!(Script::pkhx_output(&pkh, 90).is_pkhx_output(), Some((pkh, 90)));
        assert_eq!(Script::pkhx_output(&pkh, 90).is_pkh_output(), None);
    }

    #[test]
    fn test_mint_input() {
        let script = Script::mint_input(300, b"miner");
        assert!(script.is_mint_input_for(300));
        assert!(!script.is_mint_input_for(301));
        assert!(Script::mint_input(0, b"").is_mint_input_for(0));
    }

    #[test]
    fn test_serde_hex() {
        let script = Script::pkh_output(&Buf32::filled(3));
        let json = serde_json::to_string(&script).unwrap();
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
    }
}
