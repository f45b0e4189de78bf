//! Signing of pay-to-pkh inputs

use std::collections::HashMap;

use thiserror::Error;

use super::transaction::Tx;
use super::tx_out_bn_map::{OutPoint, TxOutBnMap};
use crate::crypto::{KeyPair, Pkh};
use crate::script::{sign_tx_input, HashCache, Script, ScriptError, SigHashType};

#[derive(Error, Debug)]
pub enum TxSignError {
    #[error("Spent output not found: {0}")]
    MissingOutput(OutPoint),
    #[error("No key for pkh {0}")]
    MissingKey(Pkh),
    #[error("Output {0} is not a pay-to-pkh output")]
    UnsupportedScript(OutPoint),
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
}

/// Keys indexed by the hash of their public key
#[derive(Clone, Default)]
pub struct PkhKeyMap {
    keys: HashMap<Pkh, KeyPair>,
}

impl PkhKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key_pair: KeyPair) -> Pkh {
        let pkh = key_pair.pkh();
        self.keys.insert(pkh, key_pair);
        pkh
    }

    pub fn get(&self, pkh: &Pkh) -> Option<&KeyPair> {
        self.keys.get(pkh)
    }

    pub fn pkhs(&self) -> Vec<Pkh> {
        self.keys.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Fills in unlock scripts for every input spending a pkh or pkhx output
pub struct TxSigner<'a> {
    tx_out_bn_map: &'a TxOutBnMap,
    key_map: &'a PkhKeyMap,
    hash_type: SigHashType,
}

impl<'a> TxSigner<'a> {
    pub fn new(tx_out_bn_map: &'a TxOutBnMap, key_map: &'a PkhKeyMap) -> Self {
        Self {
            tx_out_bn_map,
            key_map,
            hash_type: SigHashType::All,
        }
    }

    pub fn hash_type(mut self, hash_type: SigHashType) -> Self {
        self.hash_type = hash_type;
        self
    }

    /// Sign input `n_in` of `tx` in place
    pub fn sign_input(&self, tx: &mut Tx, n_in: usize) -> Result<(), TxSignError> {
        let input = tx
            .inputs
            .get(n_in)
            .ok_or(ScriptError::InputIndexOutOfRange(n_in))?;
        let outpoint = OutPoint::new(input.input_tx_id, input.input_tx_out_num);
        let spent = self
            .tx_out_bn_map
            .get(&outpoint.tx_id, outpoint.out_num)
            .ok_or(TxSignError::MissingOutput(outpoint))?;
        let lock = &spent.tx_out.script;

        let (pkh, expiring) = match (lock.is_pkh_output(), lock.is_pkhx_output()) {
            (Some(pkh), _) => (pkh, false),
            (None, Some((pkh, _))) => (pkh, true),
            _ => return Err(TxSignError::UnsupportedScript(outpoint)),
        };
        let key_pair = self
            .key_map
            .get(&pkh)
            .ok_or(TxSignError::MissingKey(pkh))?;

        // Fresh cache: earlier inputs may have changed since the last digest
        let mut cache = HashCache::new();
        let sig = sign_tx_input(
            tx,
            n_in,
            key_pair,
            &lock.to_buf(),
            spent.tx_out.value,
            self.hash_type,
            &mut cache,
        )?;
        let pub_key = key_pair.pub_key_buf();
        tx.inputs[n_in].script = if expiring {
            Script::pkhx_input(&sig.to_buf(), pub_key.as_slice())
        } else {
            Script::pkh_input(&sig.to_buf(), pub_key.as_slice())
        };
        Ok(())
    }

    /// Sign every non-mint input
    pub fn sign(&self, mut tx: Tx) -> Result<Tx, TxSignError> {
        for n_in in 0..tx.inputs.len() {
            if tx.inputs[n_in].is_mint() {
                continue;
            }
            self.sign_input(&mut tx, n_in)?;
        }
        Ok(tx)
    }
}

// =============================================================================
// Tests
// =============================================================================
