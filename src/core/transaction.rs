//! Transaction handling for the ledger
//!
//! Implements a UTXO-based transaction model where each output is locked by
//! a script and each input carries the unlocking pushes.
//!
//! Binary layout (big-endian):
//!
//! ```text
//! Tx:    version u8 | varint n_in | TxIn* | varint n_out | TxOut* | lock_abs u64
//! TxIn:  input_tx_id 32 | input_tx_out_num u32 | varint len | script | lock_rel u32
//! TxOut: value u64 | varint len | script
//! ```

use serde::{Deserialize, Serialize};

use crate::codec::{self, BufError, BufReader, BufWriter, Buf32};
use crate::crypto::double_blake3_hash;
use crate::script::Script;

// =============================================================================
// Constants
// =============================================================================

/// Current transaction version
pub const TX_VERSION: u8 = 1;

/// Output number marking a mint input
pub const MINT_OUT_NUM: u32 = u32::MAX;

/// Smallest encoded TxIn: id, out num, empty script length, lock_rel
const MIN_TX_IN_SIZE: usize = 32 + 4 + 1 + 4;

/// Smallest encoded TxOut: value and empty script length
const MIN_TX_OUT_SIZE: usize = 8 + 1;

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (reference to previous output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Id of the transaction holding the spent output
    pub input_tx_id: Buf32,
    /// Index of the output in that transaction
    pub input_tx_out_num: u32,
    /// Unlocking script (push-only)
    pub script: Script,
    /// Blocks that must pass after the spent output's block before spending
    pub lock_rel: u32,
}

impl TxIn {
    pub fn new(input_tx_id: Buf32, input_tx_out_num: u32, script: Script, lock_rel: u32) -> Self {
        Self {
            input_tx_id,
            input_tx_out_num,
            script,
            lock_rel,
        }
    }

    /// Sentinel input of a mint transaction
    pub fn mint(block_num: u64, mint_data: &[u8]) -> Self {
        Self::new(
            Buf32::zero(),
            MINT_OUT_NUM,
            Script::mint_input(block_num, mint_data),
            0,
        )
    }

    /// Null reference with the maximum output number
    pub fn is_mint(&self) -> bool {
        self.input_tx_id.is_zero() && self.input_tx_out_num == MINT_OUT_NUM
    }

    pub fn write_to(&self, w: &mut BufWriter) {
        w.write_fixed(&self.input_tx_id)
            .write_u32_be(self.input_tx_out_num)
            .write_var_bytes(&self.script.to_buf())
            .write_u32_be(self.lock_rel);
    }

    pub fn read_from(r: &mut BufReader<'_>) -> Result<Self, BufError> {
        let input_tx_id = r.read_fixed::<32>()?;
        let input_tx_out_num = r.read_u32_be()?;
        let script = read_script(r)?;
        let lock_rel = r.read_u32_be()?;
        Ok(Self::new(input_tx_id, input_tx_out_num, script, lock_rel))
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        self.write_to(&mut w);
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut r = BufReader::new(buf);
        let tx_in = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(tx_in)
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Amount in the smallest unit
    pub value: u64,
    /// Locking script
    pub script: Script,
}

impl TxOut {
    pub fn new(value: u64, script: Script) -> Self {
        Self { value, script }
    }

    pub fn write_to(&self, w: &mut BufWriter) {
        w.write_u64_be(self.value)
            .write_var_bytes(&self.script.to_buf());
    }

    pub fn read_from(r: &mut BufReader<'_>) -> Result<Self, BufError> {
        let value = r.read_u64_be()?;
        let script = read_script(r)?;
        Ok(Self::new(value, script))
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        self.write_to(&mut w);
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut r = BufReader::new(buf);
        let tx_out = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(tx_out)
    }
}

fn read_script(r: &mut BufReader<'_>) -> Result<Script, BufError> {
    let bytes = r.read_var_bytes()?;
    Script::from_buf(&bytes).map_err(|e| BufError::InvalidEncoding(e.to_string()))
}

// =============================================================================
// Transaction
// =============================================================================

/// A transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub version: u8,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    /// Earliest block number that may include this transaction
    pub lock_abs: u64,
}

impl Tx {
    pub fn new(version: u8, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_abs: u64) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_abs,
        }
    }

    /// Mint transaction for `block_num`, paying `outputs`
    pub fn mint(block_num: u64, mint_data: &[u8], outputs: Vec<TxOut>) -> Self {
        Self::new(
            TX_VERSION,
            vec![TxIn::mint(block_num, mint_data)],
            outputs,
            block_num,
        )
    }

    /// Exactly one input and it is the mint sentinel
    pub fn is_mint_tx(&self) -> bool {
        matches!(self.inputs.as_slice(), [only] if only.is_mint())
    }

    pub fn has_mint_input(&self) -> bool {
        self.inputs.iter().any(TxIn::is_mint)
    }

    /// Sum of output values, `None` on overflow
    pub fn total_output(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    pub fn write_to(&self, w: &mut BufWriter) {
        w.write_u8(self.version)
            .write_var_int(self.inputs.len() as u64);
        for input in &self.inputs {
            input.write_to(w);
        }
        w.write_var_int(self.outputs.len() as u64);
        for output in &self.outputs {
            output.write_to(w);
        }
        w.write_u64_be(self.lock_abs);
    }

    pub fn read_from(r: &mut BufReader<'_>) -> Result<Self, BufError> {
        let version = r.read_u8()?;
        let n_in = r.read_count(MIN_TX_IN_SIZE)?;
        let mut inputs = Vec::with_capacity(n_in);
        for _ in 0..n_in {
            inputs.push(TxIn::read_from(r)?);
        }
        let n_out = r.read_count(MIN_TX_OUT_SIZE)?;
        let mut outputs = Vec::with_capacity(n_out);
        for _ in 0..n_out {
            outputs.push(TxOut::read_from(r)?);
        }
        let lock_abs = r.read_u64_be()?;
        Ok(Self::new(version, inputs, outputs, lock_abs))
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        self.write_to(&mut w);
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut r = BufReader::new(buf);
        let tx = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(tx)
    }

    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.to_buf())
    }

    pub fn from_hex(s: &str) -> Result<Self, BufError> {
        Self::from_buf(&codec::from_hex(s)?)
    }

    /// Double BLAKE3 of the serialized transaction
    pub fn id(&self) -> Buf32 {
        double_blake3_hash(&self.to_buf())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Tx {
        Tx::new(
            TX_VERSION,
            vec![
                TxIn::new(Buf32::filled(1), 2, Script::pkh_input_placeholder(), 3),
                TxIn::new(Buf32::filled(4), 0, Script::empty(), 0),
            ],
            vec![
                TxOut::new(100, Script::pkh_output(&Buf32::filled(5))),
                TxOut::new(0, Script::empty()),
            ],
            77,
        )
    }

    #[test]
    fn test_tx_roundtrip() {
        let tx = sample_tx();
        let buf = tx.to_buf();
        assert_eq!(Tx::from_buf(&buf).unwrap(), tx);
        assert_eq!(Tx::from_hex(&tx.to_hex()).unwrap(), tx);
    }

    #[test]
    fn test_tx_layout() {
        let tx = Tx::new(1, vec![], vec![TxOut::new(5, Script::empty())], 9);
        assert_eq!(
            tx.to_buf(),
            vec![
                0x01, // version
                0x00, // no inputs
                0x01, // one output
                0, 0, 0, 0, 0, 0, 0, 5, // value
                0x00, // empty script
                0, 0, 0, 0, 0, 0, 0, 9, // lock_abs
            ]
        );
    }

    #[test]
    fn test_decode_is_strict() {
        let buf = sample_tx().to_buf();
        for cut in [1, 10, buf.len() / 2, buf.len() - 1] {
            assert!(Tx::from_buf(&buf[..cut]).is_err());
        }
        let mut extra = buf.clone();
        extra.push(0);
        assert_eq!(Tx::from_buf(&extra), Err(BufError::TrailingBytes(1)));
    }

    #[test]
    fn test_huge_count_rejected_without_allocating() {
        let buf = vec![0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(
            Tx::from_buf(&buf),
            Err(BufError::NotEnoughData { .. })
        ));
    }

    #[test]
    fn test_id_changes_with_content() {
        let tx = sample_tx();
        let mut other = tx.clone();
        other.lock_abs += 1;
        assert_ne!(tx.id(), other.id());
        assert_eq!(tx.id(), sample_tx().id());
    }

    #[test]
    fn test_mint_tx_shape() {
        let mint = Tx::mint(12, b"pool", vec![TxOut::new(50, Script::empty())]);
        assert!(mint.is_mint_tx());
        assert!(mint.has_mint_input());
        assert_eq!(mint.lock_abs, 12);
        assert!(mint.inputs[0].script.is_mint_input_for(12));
        assert!(!sample_tx().is_mint_tx());
    }

    #[test]
    fn test_total_output_overflow() {
        let tx = Tx::new(
            1,
            vec![],
            vec![
                TxOut::new(u64::MAX, Script::empty()),
                TxOut::new(1, Script::empty()),
            ],
            0,
        );
        assert_eq!(tx.total_output(), None);
        assert_eq!(sample_tx().total_output(), Some(100));
    }
}
