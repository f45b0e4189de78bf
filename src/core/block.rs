//! Block implementation for the ledger
//!
//! A block is a header followed by its transactions. The last transaction
//! is always the mint transaction paying the block reward.

use serde::{Deserialize, Serialize};

use super::header::Header;
use super::transaction::{Tx, TxOut};
use crate::codec::{self, BufError, BufReader, BufWriter, Buf32};
use crate::crypto::{calculate_merkle_root, MerkleError};

// =============================================================================
// Block Constants
// =============================================================================

/// Maximum number of transactions per block, mint tx included
pub const MAX_BLOCK_TXS: usize = 100_000;

/// Smallest unit per coin
pub const COIN: u64 = 100_000_000_000;

/// Mint amount of the first halving era
pub const INITIAL_MINT_AMOUNT: u64 = 100 * COIN;

/// Blocks between mint halvings
pub const HALVING_INTERVAL: u64 = 210_000;

/// Smallest encoded Tx: version, two empty counts, lock_abs
const MIN_TX_SIZE: usize = 1 + 1 + 1 + 8;

/// Block reward for `block_num`
pub fn mint_amount(block_num: u64) -> u64 {
    let halvings = block_num / HALVING_INTERVAL;
    if halvings >= 64 {
        0
    } else {
        INITIAL_MINT_AMOUNT >> halvings
    }
}

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub txs: Vec<Tx>,
}

impl Block {
    pub fn new(header: Header, txs: Vec<Tx>) -> Self {
        Self { header, txs }
    }

    /// Genesis block holding a single mint tx paying `outputs`
    pub fn genesis(
        timestamp: u64,
        initial_target: Buf32,
        mint_data: &[u8],
        outputs: Vec<TxOut>,
    ) -> Self {
        let mint = Tx::mint(0, mint_data, outputs);
        let header = Header::genesis(mint.id(), timestamp, initial_target);
        Self::new(header, vec![mint])
    }

    pub fn id(&self) -> Buf32 {
        self.header.id()
    }

    pub fn block_num(&self) -> u64 {
        self.header.block_num
    }

    pub fn tx_ids(&self) -> Vec<Buf32> {
        self.txs.iter().map(Tx::id).collect()
    }

    /// Merkle root over the transaction ids
    pub fn compute_merkle_root(&self) -> Result<Buf32, MerkleError> {
        calculate_merkle_root(&self.tx_ids())
    }

    pub fn verify_merkle_root(&self) -> bool {
        matches!(self.compute_merkle_root(), Ok(root) if root == self.header.merkle_root)
    }

    pub fn mint_tx(&self) -> Option<&Tx> {
        self.txs.last()
    }

    /// Every transaction except the trailing mint tx
    pub fn spend_txs(&self) -> &[Tx] {
        match self.txs.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    pub fn write_to(&self, w: &mut BufWriter) {
        self.header.write_to(w);
        w.write_var_int(self.txs.len() as u64);
        for tx in &self.txs {
            tx.write_to(w);
        }
    }

    pub fn read_from(r: &mut BufReader<'_>) -> Result<Self, BufError> {
        let header = Header::read_from(r)?;
        let n_tx = r.read_count(MIN_TX_SIZE)?;
        if n_tx > MAX_BLOCK_TXS {
            return Err(BufError::TooMany {
                what: "transactions",
                count: n_tx as u64,
                max: MAX_BLOCK_TXS as u64,
            });
        }
        let mut txs = Vec::with_capacity(n_tx);
        for _ in 0..n_tx {
            txs.push(Tx::read_from(r)?);
        }
        Ok(Self::new(header, txs))
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        self.write_to(&mut w);
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        let mut r = BufReader::new(buf);
        let block = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(block)
    }

    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.to_buf())
    }

    pub fn from_hex(s: &str) -> Result<Self, BufError> {
        Self::from_buf(&codec::from_hex(s)?)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::HEADER_SIZE;
    use crate::core::transaction::TxIn;
    use crate::script::Script;

    fn genesis() -> Block {
        Block::genesis(
            1_700_000_000,
            Buf32::zero(),
            b"genesis",
            vec![TxOut::new(mint_amount(0), Script::pkh_output(&Buf32::filled(1)))],
        )
    }

    #[test]
    fn test_mint_amount_halving() {
        assert_eq!(mint_amount(0), 100 * COIN);
        assert_eq!(mint_amount(HALVING_INTERVAL - 1), 100 * COIN);
        assert_eq!(mint_amount(HALVING_INTERVAL), 50 * COIN);
        assert_eq!(mint_amount(HALVING_INTERVAL * 2), 25 * COIN);
        assert_eq!(mint_amount(HALVING_INTERVAL * 64), 0);
        assert_eq!(mint_amount(u64::MAX), 0);
    }

    #[test]
    fn test_genesis_block() {
        let block = genesis();
        let header = &block.header;
        assert!(header.prev_block_id.is_zero());
        assert_eq!(header.block_num, 0);
        assert!(header.target.is_zero());
        assert_eq!(block.txs.len(), 1);
        assert!(block.mint_tx().unwrap().is_mint_tx());
        assert_eq!(header.merkle_root, block.compute_merkle_root().unwrap());
        assert!(block.verify_merkle_root());
        assert!(block.spend_txs().is_empty());
    }

    #[test]
    fn test_block_roundtrip() {
        let mut block = genesis();
        block.txs.insert(
            0,
            Tx::new(
                1,
                vec![TxIn::new(Buf32::filled(3), 1, Script::empty(), 0)],
                vec![TxOut::new(4, Script::empty())],
                0,
            ),
        );
        let buf = block.to_buf();
        assert_eq!(&buf[..HEADER_SIZE], block.header.to_buf().as_slice());
        assert_eq!(Block::from_buf(&buf).unwrap(), block);
        assert_eq!(Block::from_hex(&block.to_hex()).unwrap(), block);
        assert_eq!(block.spend_txs().len(), 1);
    }

    #[test]
    fn test_block_decode_strict() {
        let buf = genesis().to_buf();
        assert!(Block::from_buf(&buf[..buf.len() - 1]).is_err());
        assert!(Block::from_buf(&buf[..HEADER_SIZE]).is_err());
        let mut extra = buf;
        extra.extend_from_slice(&[0, 0]);
        assert_eq!(Block::from_buf(&extra), Err(BufError::TrailingBytes(2)));
    }

    #[test]
    fn test_merkle_root_mismatch_detected() {
        let mut block = genesis();
        block.header.merkle_root = Buf32::filled(0xAB);
        assert!(!block.verify_merkle_root());
    }

    #[test]
    fn test_empty_block_has_no_root() {
        let block = Block::new(genesis().header, vec![]);
        assert_eq!(block.compute_merkle_root(), Err(MerkleError::EmptyLeaves));
        assert!(!block.verify_merkle_root());
    }
}
