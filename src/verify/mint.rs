//! Mint transaction rules

use crate::core::{mint_amount, Tx};

/// Check that `tx` is the mint transaction a block at `block_num` must end with
pub fn is_valid_mint_tx(tx: &Tx, block_num: u64) -> bool {
    match res_is_valid_mint_tx(tx, block_num) {
        Ok(()) => true,
        Err(reason) => {
            log::debug!("Mint tx {} rejected: {}", tx.id(), reason);
            false
        }
    }
}

fn res_is_valid_mint_tx(tx: &Tx, block_num: u64) -> Result<(), &'static str> {
    if !tx.is_mint_tx() {
        return Err("not a single mint input");
    }
    if !tx.inputs[0].script.is_mint_input_for(block_num) {
        return Err("unlock script does not commit to the block number");
    }
    if tx.lock_abs != block_num {
        return Err("lock_abs differs from block number");
    }
    if tx.outputs.is_empty() {
        return Err("no outputs");
    }
    match tx.total_output() {
        Some(total) if total == mint_amount(block_num) => Ok(()),
        Some(_) => Err("output total differs from mint amount"),
        None => Err("output total overflows"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Buf32;
    use crate::core::{TxIn, TxOut};
    use crate::script::Script;

    fn mint(block_num: u64, outputs: Vec<TxOut>) -> Tx {
        Tx::mint(block_num, b"miner", outputs)
    }

    fn full(block_num: u64) -> Vec<TxOut> {
        vec![TxOut::new(mint_amount(block_num), Script::empty())]
    }

    #[test]
    fn test_valid_mint_tx() {
        assert!(is_valid_mint_tx(&mint(7, full(7)), 7));

        let split = vec![
            TxOut::new(mint_amount(7) - 1, Script::empty()),
            TxOut::new(1, Script::empty()),
        ];
        assert!(is_valid_mint_tx(&mint(7, split), 7));
    }

    #[test]
    fn test_wrong_block_num() {
        let tx = mint(7, full(8));
        assert!(!is_valid_mint_tx(&tx, 8));
    }

    #[test]
    fn test_wrong_lock_abs() {
        let mut tx = mint(7, full(7));
        tx.lock_abs = 6;
        assert!(!is_valid_mint_tx(&tx, 7));
    }

    #[test]
    fn test_wrong_amount() {
        let too_much = vec![TxOut::new(mint_amount(7) + 1, Script::empty())];
        assert!(!is_valid_mint_tx(&mint(7, too_much), 7));
        assert!(!is_valid_mint_tx(&mint(7, vec![]), 7));
    }

    #[test]
    fn test_extra_input_rejected() {
        let mut tx = mint(7, full(7));
        tx.inputs
            .push(TxIn::new(Buf32::filled(1), 0, Script::empty(), 0));
        assert!(!is_valid_mint_tx(&tx, 7));
    }

    #[test]
    fn test_non_push_unlock_rejected() {
        let mut tx = mint(7, full(7));
        tx.inputs[0].script = Script::from_asm("07 OP_DUP").unwrap();
        assert!(!is_valid_mint_tx(&tx, 7));
    }
}
