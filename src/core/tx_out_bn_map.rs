//! Live spendable-output map
//!
//! Maps an outpoint to the output it names and the block number in which
//! that output was created. Relative locks are measured from that block.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::block::Block;
use super::transaction::{Tx, TxOut};
use crate::codec::Buf32;

/// Reference to one output of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: Buf32,
    pub out_num: u32,
}

impl OutPoint {
    pub fn new(tx_id: Buf32, out_num: u32) -> Self {
        Self { tx_id, out_num }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.out_num)
    }
}

/// An output together with its origin block number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutBn {
    pub tx_out: TxOut,
    pub block_num: u64,
}

impl TxOutBn {
    pub fn new(tx_out: TxOut, block_num: u64) -> Self {
        Self { tx_out, block_num }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxOutBnMap {
    map: HashMap<OutPoint, TxOutBn>,
}

impl TxOutBnMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn add(&mut self, tx_id: Buf32, out_num: u32, tx_out: TxOut, block_num: u64) {
        self.map
            .insert(OutPoint::new(tx_id, out_num), TxOutBn::new(tx_out, block_num));
    }

    pub fn remove(&mut self, tx_id: &Buf32, out_num: u32) -> Option<TxOutBn> {
        self.map.remove(&OutPoint::new(*tx_id, out_num))
    }

    pub fn get(&self, tx_id: &Buf32, out_num: u32) -> Option<&TxOutBn> {
        self.map.get(&OutPoint::new(*tx_id, out_num))
    }

    pub fn contains(&self, tx_id: &Buf32, out_num: u32) -> bool {
        self.map.contains_key(&OutPoint::new(*tx_id, out_num))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutBn)> {
        self.map.iter()
    }

    /// Make every output of `tx` spendable from `block_num`
    pub fn add_tx_outputs(&mut self, tx: &Tx, block_num: u64) {
        let tx_id = tx.id();
        for (out_num, tx_out) in tx.outputs.iter().enumerate() {
            self.add(tx_id, out_num as u32, tx_out.clone(), block_num);
        }
    }

    /// Drop every output `tx` spends; mint inputs reference nothing
    pub fn remove_tx_inputs(&mut self, tx: &Tx) {
        for input in tx.inputs.iter().filter(|i| !i.is_mint()) {
            self.remove(&input.input_tx_id, input.input_tx_out_num);
        }
    }

    /// Advance the map past an accepted block
    pub fn apply_block(&mut self, block: &Block) {
        let block_num = block.block_num();
        for tx in &block.txs {
            self.remove_tx_inputs(tx);
            self.add_tx_outputs(tx, block_num);
        }
        log::debug!(
            "Applied block {}: {} spendable outputs",
            block_num,
            self.map.len()
        );
    }

    /// Total value of outputs satisfying `pred`
    pub fn total_value<F>(&self, pred: F) -> u64
    where
        F: Fn(&TxOutBn) -> bool,
    {
        self.map
            .values()
            .filter(|o| pred(o))
            .fold(0u64, |acc, o| acc.saturating_add(o.tx_out.value))
    }
}

// =============================================================================
// Tests
// =============================================================================
