//! Block verification
//!
//! A block is checked against the header chain it extends and a snapshot of
//! the spendable outputs before it. Transactions are applied in order to a
//! private copy of that snapshot, so an output created earlier in the block
//! may be spent later in the same block but never twice.

use thiserror::Error;

use super::mint::is_valid_mint_tx;
use super::tx_verifier::{TxRejection, TxVerifier};
use crate::core::{Block, HeaderChain, HeaderError, TxOutBnMap, MAX_BLOCK_TXS};
use crate::mining::pow::{verify_work_pack_pow, PowError};

/// Why a block was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockRejection {
    #[error("Block timestamp {timestamp} is after verification time {now}")]
    FromTheFuture { timestamp: u64, now: u64 },
    #[error("Previous header {0} not found")]
    UnknownPrev(u64),
    #[error("Header invalid: {0}")]
    Header(#[from] HeaderError),
    #[error("Merkle root mismatch")]
    MerkleRootMismatch,
    #[error("Last transaction is not a valid mint tx")]
    InvalidMintTx,
    #[error("Transaction {index} invalid: {reason}")]
    InvalidTx { index: usize, reason: TxRejection },
    #[error("Proof of work invalid: {0}")]
    Pow(#[from] PowError),
}

pub struct BlockVerifier<'a> {
    block: &'a Block,
    tx_out_bn_map: &'a TxOutBnMap,
    chain: &'a HeaderChain,
}

impl<'a> BlockVerifier<'a> {
    /// `chain` must hold the header preceding `block`; `tx_out_bn_map` is
    /// the spendable set as of that header and is never modified.
    pub fn new(block: &'a Block, tx_out_bn_map: &'a TxOutBnMap, chain: &'a HeaderChain) -> Self {
        Self {
            block,
            tx_out_bn_map,
            chain,
        }
    }

    /// Check the block as seen at `now` (Unix seconds)
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.log_result(self.res_is_valid_at(now))
    }

    /// [`is_valid_at`](Self::is_valid_at) plus both proof-of-work hashes
    pub fn is_valid_with_pow_at(&self, now: u64) -> bool {
        self.log_result(self.res_is_valid_with_pow_at(now))
    }

    pub fn res_is_valid_at(&self, now: u64) -> Result<(), BlockRejection> {
        let header = &self.block.header;
        if now < header.timestamp {
            return Err(BlockRejection::FromTheFuture {
                timestamp: header.timestamp,
                now,
            });
        }
        self.verify_header(now)?;
        if !self.block.verify_merkle_root() {
            return Err(BlockRejection::MerkleRootMismatch);
        }
        self.verify_txs()?;
        Ok(())
    }

    pub fn res_is_valid_with_pow_at(&self, now: u64) -> Result<(), BlockRejection> {
        self.res_is_valid_at(now)?;
        let prev_num = self.block.block_num().saturating_sub(1);
        let lch10_ids = self.chain.lch10_ids_through(prev_num);
        verify_work_pack_pow(&self.block.header, &lch10_ids)?;
        Ok(())
    }

    fn verify_header(&self, now: u64) -> Result<(), BlockRejection> {
        let header = &self.block.header;
        let prev_num = header
            .block_num
            .checked_sub(1)
            .ok_or(BlockRejection::UnknownPrev(0))?;
        let prev = self
            .chain
            .get(prev_num)
            .ok_or(BlockRejection::UnknownPrev(prev_num))?;
        let adj = self.chain.adjustment_header(header.block_num);
        header.res_is_valid_at(prev, adj, now)?;

        let num_txs = self.block.txs.len();
        if num_txs == 0 || num_txs > MAX_BLOCK_TXS {
            return Err(HeaderError::InvalidTxCount(num_txs).into());
        }
        Ok(())
    }

    fn verify_txs(&self) -> Result<(), BlockRejection> {
        let block_num = self.block.block_num();
        match self.block.mint_tx() {
            Some(mint) if is_valid_mint_tx(mint, block_num) => {}
            _ => return Err(BlockRejection::InvalidMintTx),
        }

        let mut working = self.tx_out_bn_map.clone();
        for (index, tx) in self.block.spend_txs().iter().enumerate() {
            TxVerifier::new(tx, &working, block_num)
                .res_verify()
                .map_err(|reason| BlockRejection::InvalidTx { index, reason })?;
            working.remove_tx_inputs(tx);
            working.add_tx_outputs(tx, block_num);
        }
        Ok(())
    }

    fn log_result(&self, result: Result<(), BlockRejection>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Block {} rejected: {}", self.block.block_num(), e);
                false
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
