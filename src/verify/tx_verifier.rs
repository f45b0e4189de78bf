//! Transaction verification against the live output map
//!
//! Checks run in a fixed order and the first failure rejects the
//! transaction. Callers see only pass or fail; the reason is logged at
//! debug level.

use std::collections::HashSet;

use thiserror::Error;

use crate::core::{OutPoint, Tx, TxOutBnMap};
use crate::script::{HashCache, Interpreter};

/// Why a transaction was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxRejection {
    #[error("lock_abs {lock_abs} is above block {block_num}")]
    LockAbsNotReached { lock_abs: u64, block_num: u64 },
    #[error("Mint input outside the mint transaction")]
    MintInput,
    #[error("Output {0} is spent twice")]
    DuplicateInput(OutPoint),
    #[error("Input {0} spends an unknown output")]
    MissingOutput(usize),
    #[error("Input {0} unlock script is not push-only")]
    UnlockNotPushOnly(usize),
    #[error("Input {n_in} script failed: {reason}")]
    ScriptFailed { n_in: usize, reason: String },
    #[error("Input {0} relative lock not reached")]
    LockRelNotReached(usize),
    #[error("Value overflow")]
    ValueOverflow,
    #[error("Inputs total {inputs} but outputs total {outputs}")]
    ValueMismatch { inputs: u64, outputs: u64 },
}

pub struct TxVerifier<'a> {
    tx: &'a Tx,
    tx_out_bn_map: &'a TxOutBnMap,
    block_num: u64,
    hash_cache: HashCache,
}

impl<'a> TxVerifier<'a> {
    /// Verify `tx` for inclusion in the block at `block_num`
    pub fn new(tx: &'a Tx, tx_out_bn_map: &'a TxOutBnMap, block_num: u64) -> Self {
        Self {
            tx,
            tx_out_bn_map,
            block_num,
            hash_cache: HashCache::new(),
        }
    }

    pub fn verify(&mut self) -> bool {
        match self.res_verify() {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Tx {} rejected: {}", self.tx.id(), e);
                false
            }
        }
    }

    pub fn res_verify(&mut self) -> Result<(), TxRejection> {
        self.verify_lock_abs()?;
        self.verify_no_mint_input()?;
        self.verify_no_double_spend()?;
        self.verify_inputs()?;
        self.verify_output_values()
    }

    fn verify_lock_abs(&self) -> Result<(), TxRejection> {
        if self.tx.lock_abs > self.block_num {
            return Err(TxRejection::LockAbsNotReached {
                lock_abs: self.tx.lock_abs,
                block_num: self.block_num,
            });
        }
        Ok(())
    }

    fn verify_no_mint_input(&self) -> Result<(), TxRejection> {
        if self.tx.has_mint_input() {
            return Err(TxRejection::MintInput);
        }
        Ok(())
    }

    fn verify_no_double_spend(&self) -> Result<(), TxRejection> {
        let mut seen = HashSet::with_capacity(self.tx.inputs.len());
        for input in &self.tx.inputs {
            let outpoint = OutPoint::new(input.input_tx_id, input.input_tx_out_num);
            if !seen.insert(outpoint) {
                return Err(TxRejection::DuplicateInput(outpoint));
            }
        }
        Ok(())
    }

    fn verify_inputs(&mut self) -> Result<(), TxRejection> {
        let tx = self.tx;
        for (n_in, input) in tx.inputs.iter().enumerate() {
            let spent = self
                .tx_out_bn_map
                .get(&input.input_tx_id, input.input_tx_out_num)
                .ok_or(TxRejection::MissingOutput(n_in))?;
            if !input.script.is_push_only() {
                return Err(TxRejection::UnlockNotPushOnly(n_in));
            }
            let mut interp = Interpreter::new(tx, n_in, spent.tx_out.value, &mut self.hash_cache);
            if !interp.eval_tx_in(&input.script, &spent.tx_out.script) {
                return Err(TxRejection::ScriptFailed {
                    n_in,
                    reason: interp.err_str.clone(),
                });
            }
            let matured = spent
                .block_num
                .checked_add(input.lock_rel as u64)
                .is_some_and(|ready| self.block_num >= ready);
            if !matured {
                return Err(TxRejection::LockRelNotReached(n_in));
            }
        }
        Ok(())
    }

    fn verify_output_values(&self) -> Result<(), TxRejection> {
        let mut inputs = 0u64;
        for (n_in, input) in self.tx.inputs.iter().enumerate() {
            let spent = self
                .tx_out_bn_map
                .get(&input.input_tx_id, input.input_tx_out_num)
                .ok_or(TxRejection::MissingOutput(n_in))?;
            inputs = inputs
                .checked_add(spent.tx_out.value)
                .ok_or(TxRejection::ValueOverflow)?;
        }
        let outputs = self.tx.total_output().ok_or(TxRejection::ValueOverflow)?;
        if inputs != outputs {
            return Err(TxRejection::ValueMismatch { inputs, outputs });
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
