//! Transaction builder
//!
//! Selects pay-to-pkh outputs from a [`TxOutBnMap`] until the requested
//! outputs are covered, then adds a change output so that inputs and outputs
//! balance exactly. Inputs carry placeholder unlock scripts until signed by
//! [`TxSigner`](super::tx_signer::TxSigner).

use thiserror::Error;

use super::transaction::{Tx, TxIn, TxOut, TX_VERSION};
use super::tx_out_bn_map::{OutPoint, TxOutBnMap};
use crate::crypto::Pkh;
use crate::script::Script;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxBuilderError {
    #[error("Transaction has no outputs")]
    NoOutputs,
    #[error("Output values overflow")]
    ValueOverflow,
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
}

/// Builder for spend transactions
pub struct TxBuilder<'a> {
    tx_out_bn_map: &'a TxOutBnMap,
    change_script: Script,
    outputs: Vec<TxOut>,
    spend_from: Option<Vec<Pkh>>,
    lock_abs: u64,
}

impl<'a> TxBuilder<'a> {
    pub fn new(tx_out_bn_map: &'a TxOutBnMap, change_script: Script) -> Self {
        Self {
            tx_out_bn_map,
            change_script,
            outputs: Vec::new(),
            spend_from: None,
            lock_abs: 0,
        }
    }

    /// Add an output
    pub fn add_output(mut self, value: u64, script: Script) -> Self {
        self.outputs.push(TxOut::new(value, script));
        self
    }

    /// Pay `value` to a public key hash
    pub fn pay_to_pkh(self, pkh: &Pkh, value: u64) -> Self {
        self.add_output(value, Script::pkh_output(pkh))
    }

    /// Only spend outputs locked to one of `pkhs`
    pub fn spend_from(mut self, pkhs: &[Pkh]) -> Self {
        self.spend_from = Some(pkhs.to_vec());
        self
    }

    /// Set the earliest block number that may include the transaction
    pub fn lock_abs(mut self, lock_abs: u64) -> Self {
        self.lock_abs = lock_abs;
        self
    }

    /// Build an unsigned transaction
    pub fn build(self) -> Result<Tx, TxBuilderError> {
        if self.outputs.is_empty() {
            return Err(TxBuilderError::NoOutputs);
        }
        let needed = self
            .outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
            .ok_or(TxBuilderError::ValueOverflow)?;

        // Deterministic selection order
        let mut candidates: Vec<(&OutPoint, u64)> = self
            .tx_out_bn_map
            .iter()
            .filter_map(|(outpoint, bn)| {
                let pkh = bn.tx_out.script.is_pkh_output()?;
                match &self.spend_from {
                    Some(allowed) if !allowed.contains(&pkh) => None,
                    _ => Some((outpoint, bn.tx_out.value)),
                }
            })
            .collect();
        candidates.sort();

        let mut inputs = Vec::new();
        let mut available = 0u64;
        for (outpoint, value) in candidates {
            if available >= needed && !inputs.is_empty() {
                break;
            }
            available = available
                .checked_add(value)
                .ok_or(TxBuilderError::ValueOverflow)?;
            inputs.push(TxIn::new(
                outpoint.tx_id,
                outpoint.out_num,
                Script::pkh_input_placeholder(),
                0,
            ));
        }
        if available < needed || inputs.is_empty() {
            return Err(TxBuilderError::InsufficientFunds { needed, available });
        }

        let mut outputs = self.outputs;
        let change = available - needed;
        if change > 0 {
            outputs.push(TxOut::new(change, self.change_script));
        }

        log::debug!(
            "Built tx with {} inputs, {} outputs, change {}",
            inputs.len(),
            outputs.len(),
            change
        );
        Ok(Tx::new(TX_VERSION, inputs, outputs, self.lock_abs))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buf32;

    fn funded_map(pkh: &Pkh, values: &[u64]) -> TxOutBnMap {
        let mut map = TxOutBnMap::new();
        for (i, value) in values.iter().enumerate() {
            map.add(
                Buf32::filled(i as u8 + 1),
                0,
                TxOut::new(*value, Script::pkh_output(pkh)),
                0,
            );
        }
        map
    }

    #[test]
    fn test_build_with_change() {
        let me = Buf32::filled(0xAA);
        let map = funded_map(&me, &[30, 30, 30]);
        let tx = TxBuilder::new(&map, Script::pkh_output(&me))
            .pay_to_pkh(&Buf32::filled(0xBB), 50)
            .build()
            .unwrap();

        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[1].value, 10);
        assert_eq!(tx.total_output(), Some(60));
    }

    #[test]
    fn test_build_exact_has_no_change() {
        let me = Buf32::filled(0xAA);
        let map = funded_map(&me, &[25, 25]);
        let tx = TxBuilder::new(&map, Script::empty())
            .pay_to_pkh(&Buf32::filled(0xBB), 50)
            .lock_abs(3)
            .build()
            .unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.lock_abs, 3);
    }

    #[test]
    fn test_insufficient_funds() {
        let me = Buf32::filled(0xAA);
        let map = funded_map(&me, &[10]);
        let err = TxBuilder::new(&map, Script::empty())
            .pay_to_pkh(&me, 11)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            TxBuilderError::InsufficientFunds {
                needed: 11,
                available: 10
            }
        );
    }

    #[test]
    fn test_no_outputs() {
        let map = TxOutBnMap::new();
        assert_eq!(
            TxBuilder::new(&map, Script::empty()).build(),
            Err(TxBuilderError::NoOutputs)
        );
    }

    #[test]
    fn test_spend_from_filters_owner() {
        let me = Buf32::filled(0xAA);
        let map = funded_map(&me, &[100]);
        let result = TxBuilder::new(&map, Script::empty())
            .spend_from(&[Buf32::filled(0xCC)])
            .pay_to_pkh(&me, 1)
            .build();
        assert!(matches!(
            result,
            Err(TxBuilderError::InsufficientFunds { available: 0, .. })
        ));
    }
}
