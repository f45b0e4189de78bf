//! Signature hashing
//!
//! The digest an input signature commits to is the double BLAKE3 of:
//!
//! ```text
//! version u8 | prevouts_hash 32 | lock_rel_hash 32 | input tx id 32 |
//! input out num u32 | varint len | script code | value u64 | lock_rel u32 |
//! outputs_hash 32 | lock_abs u64 | hash_type u8
//! ```
//!
//! The three aggregate hashes are blanked according to the hash type, as in
//! BIP-143.

use serde::{Deserialize, Serialize};

use super::error::ScriptError;
use crate::codec::{BufWriter, Buf32, FixedBuf};
use crate::core::transaction::Tx;
use crate::crypto::{double_blake3_hash, KeyPair, COMPACT_SIG_SIZE};

/// Encoded signature length: hash type byte plus compact signature
pub const TX_SIGNATURE_SIZE: usize = 1 + COMPACT_SIG_SIZE;

/// Signature hash type determines what parts of the transaction are signed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum SigHashType {
    /// Sign all inputs and all outputs (default)
    #[default]
    All = 0x01,
    /// Sign all inputs but no outputs
    None = 0x02,
    /// Sign all inputs and only the output with same index
    Single = 0x03,
    /// SIGHASH_ALL | SIGHASH_ANYONECANPAY
    AllAnyoneCanPay = 0x81,
    /// SIGHASH_NONE | SIGHASH_ANYONECANPAY
    NoneAnyoneCanPay = 0x82,
    /// SIGHASH_SINGLE | SIGHASH_ANYONECANPAY
    SingleAnyoneCanPay = 0x83,
}

impl SigHashType {
    pub const ANYONE_CAN_PAY: u8 = 0x80;

    /// Parse sighash type from byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SigHashType::All),
            0x02 => Some(SigHashType::None),
            0x03 => Some(SigHashType::Single),
            0x81 => Some(SigHashType::AllAnyoneCanPay),
            0x82 => Some(SigHashType::NoneAnyoneCanPay),
            0x83 => Some(SigHashType::SingleAnyoneCanPay),
            _ => None,
        }
    }

    /// Check if this sighash includes ANYONECANPAY flag
    pub fn is_anyone_can_pay(&self) -> bool {
        (*self as u8) & Self::ANYONE_CAN_PAY != 0
    }

    /// Get the base type (without ANYONECANPAY flag)
    pub fn base_type(&self) -> SigHashType {
        match (*self as u8) & 0x1f {
            0x02 => SigHashType::None,
            0x03 => SigHashType::Single,
            _ => SigHashType::All,
        }
    }
}

/// Aggregate hashes shared by every input of one transaction
#[derive(Debug, Clone, Default)]
pub struct HashCache {
    prevouts_hash: Option<Buf32>,
    lock_rel_hash: Option<Buf32>,
    outputs_hash: Option<Buf32>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn prevouts_hash(&mut self, tx: &Tx) -> Buf32 {
        *self.prevouts_hash.get_or_insert_with(|| {
            let mut w = BufWriter::new();
            for input in &tx.inputs {
                w.write_fixed(&input.input_tx_id)
                    .write_u32_be(input.input_tx_out_num);
            }
            double_blake3_hash(&w.to_buf())
        })
    }

    fn lock_rel_hash(&mut self, tx: &Tx) -> Buf32 {
        *self.lock_rel_hash.get_or_insert_with(|| {
            let mut w = BufWriter::new();
            for input in &tx.inputs {
                w.write_u32_be(input.lock_rel);
            }
            double_blake3_hash(&w.to_buf())
        })
    }

    fn outputs_hash(&mut self, tx: &Tx) -> Buf32 {
        *self.outputs_hash.get_or_insert_with(|| {
            let mut w = BufWriter::new();
            for output in &tx.outputs {
                w.write(&output.to_buf());
            }
            double_blake3_hash(&w.to_buf())
        })
    }
}

/// Build the preimage for input `n_in`
pub fn sighash_preimage(
    tx: &Tx,
    n_in: usize,
    script_code: &[u8],
    value: u64,
    hash_type: SigHashType,
    cache: &mut HashCache,
) -> Result<Vec<u8>, ScriptError> {
    let input = tx
        .inputs
        .get(n_in)
        .ok_or(ScriptError::InputIndexOutOfRange(n_in))?;
    let base = hash_type.base_type();
    let anyone_can_pay = hash_type.is_anyone_can_pay();

    let prevouts_hash = if anyone_can_pay {
        Buf32::zero()
    } else {
        cache.prevouts_hash(tx)
    };

    let lock_rel_hash = if anyone_can_pay || base != SigHashType::All {
        Buf32::zero()
    } else {
        cache.lock_rel_hash(tx)
    };

    let outputs_hash = match base {
        SigHashType::All => cache.outputs_hash(tx),
        SigHashType::Single => match tx.outputs.get(n_in) {
            Some(output) => double_blake3_hash(&output.to_buf()),
            None => Buf32::zero(),
        },
        _ => Buf32::zero(),
    };

    let mut w = BufWriter::new();
    w.write_u8(tx.version)
        .write_fixed(&prevouts_hash)
        .write_fixed(&lock_rel_hash)
        .write_fixed(&input.input_tx_id)
        .write_u32_be(input.input_tx_out_num)
        .write_var_bytes(script_code)
        .write_u64_be(value)
        .write_u32_be(input.lock_rel)
        .write_fixed(&outputs_hash)
        .write_u64_be(tx.lock_abs)
        .write_u8(hash_type as u8);
    Ok(w.to_buf())
}

/// Digest signed by input `n_in`
pub fn sighash(
    tx: &Tx,
    n_in: usize,
    script_code: &[u8],
    value: u64,
    hash_type: SigHashType,
    cache: &mut HashCache,
) -> Result<Buf32, ScriptError> {
    let preimage = sighash_preimage(tx, n_in, script_code, value, hash_type, cache)?;
    Ok(double_blake3_hash(&preimage))
}

/// Signature as it appears on the stack: hash type then compact signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSignature {
    pub hash_type: SigHashType,
    pub sig: FixedBuf<COMPACT_SIG_SIZE>,
}

impl TxSignature {
    pub fn new(hash_type: SigHashType, sig: FixedBuf<COMPACT_SIG_SIZE>) -> Self {
        Self { hash_type, sig }
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TX_SIGNATURE_SIZE);
        out.push(self.hash_type as u8);
        out.extend_from_slice(self.sig.as_slice());
        out
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, ScriptError> {
        if buf.len() != TX_SIGNATURE_SIZE {
            return Err(ScriptError::InvalidSignatureEncoding);
        }
        let hash_type =
            SigHashType::from_byte(buf[0]).ok_or(ScriptError::InvalidSignatureEncoding)?;
        let sig = FixedBuf::from_slice(&buf[1..]).map_err(|_| ScriptError::InvalidSignatureEncoding)?;
        Ok(Self { hash_type, sig })
    }
}

/// Sign input `n_in` of `tx` spending an output locked by `script_code`
pub fn sign_tx_input(
    tx: &Tx,
    n_in: usize,
    key_pair: &KeyPair,
    script_code: &[u8],
    value: u64,
    hash_type: SigHashType,
    cache: &mut HashCache,
) -> Result<TxSignature, ScriptError> {
    let digest = sighash(tx, n_in, script_code, value, hash_type, cache)?;
    Ok(TxSignature::new(hash_type, key_pair.sign(&digest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TxIn, TxOut};
    use crate::script::Script;

    fn sample_tx() -> Tx {
        Tx::new(
            1,
            vec![
                TxIn::new(Buf32::filled(1), 0, Script::empty(), 0),
                TxIn::new(Buf32::filled(2), 3, Script::empty(), 5),
            ],
            vec![
                TxOut::new(10, Script::pkh_output(&Buf32::filled(7))),
                TxOut::new(20, Script::pkh_output(&Buf32::filled(8))),
            ],
            0,
        )
    }

    #[test]
    fn test_preimage_layout() {
        let tx = sample_tx();
        let code = Script::pkh_output(&Buf32::filled(9)).to_buf();
        let pre =
            sighash_preimage(&tx, 1, &code, 100, SigHashType::All, &mut HashCache::new()).unwrap();
        assert_eq!(pre.len(), 1 + 32 + 32 + 32 + 4 + 1 + code.len() + 8 + 4 + 32 + 8 + 1);
        assert_eq!(pre[0], 1);
        assert_eq!(*pre.last().unwrap(), 0x01);
    }

    #[test]
    fn test_hash_types_commit_differently() {
        let tx = sample_tx();
        let code = b"code";
        let mut cache = HashCache::new();
        let all = sighash(&tx, 0, code, 1, SigHashType::All, &mut cache).unwrap();
        let none = sighash(&tx, 0, code, 1, SigHashType::None, &mut cache).unwrap();
        let single = sighash(&tx, 0, code, 1, SigHashType::Single, &mut cache).unwrap();
        assert_ne!(all, none);
        assert_ne!(all, single);

        // NONE does not commit to outputs
        let mut changed = tx.clone();
        changed.outputs[1].value = 999;
        assert_eq!(
            none,
            sighash(&changed, 0, code, 1, SigHashType::None, &mut HashCache::new()).unwrap()
        );
        // SINGLE only commits to the matching output
        assert_eq!(
            single,
            sighash(&changed, 0, code, 1, SigHashType::Single, &mut HashCache::new()).unwrap()
        );
        assert_ne!(
            all,
            sighash(&changed, 0, code, 1, SigHashType::All, &mut HashCache::new()).unwrap()
        );
    }

    #[test]
    fn test_anyone_can_pay_ignores_other_inputs() {
        let tx = sample_tx();
        let mut changed = tx.clone();
        changed.inputs[1].input_tx_id = Buf32::filled(0xEE);
        let a = sighash(&tx, 0, b"", 1, SigHashType::AllAnyoneCanPay, &mut HashCache::new());
        let b = sighash(&changed, 0, b"", 1, SigHashType::AllAnyoneCanPay, &mut HashCache::new());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_out_of_range_input() {
        let tx = sample_tx();
        assert_eq!(
            sighash(&tx, 5, b"", 0, SigHashType::All, &mut HashCache::new()),
            Err(ScriptError::InputIndexOutOfRange(5))
        );
    }

    #[test]
    fn test_signature_encoding() {
        let sig = TxSignature::new(SigHashType::Single, FixedBuf::filled(4));
        let buf = sig.to_buf();
        assert_eq!(buf.len(), TX_SIGNATURE_SIZE);
        assert_eq!(TxSignature::from_buf(&buf).unwrap(), sig);
        assert!(TxSignature::from_buf(&buf[1..]).is_err());

        let mut bad = buf;
        bad[0] = 0x04;
        assert!(TxSignature::from_buf(&bad).is_err());
    }

    #[test]
    fn test_sign_tx_input_verifies() {
        let tx = sample_tx();
        let kp = KeyPair::generate();
        let mut cache = HashCache::new();
        let sig = sign_tx_input(&tx, 0, &kp, b"code", 42, SigHashType::All, &mut cache).unwrap();
        let digest = sighash(&tx, 0, b"code", 42, SigHashType::All, &mut cache).unwrap();
        assert!(kp.verify(&digest, sig.sig.as_slice()));
    }
}
