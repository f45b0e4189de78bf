//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model with absolute and relative locks)
//! - Headers (217-byte fixed layout, consensus rules)
//! - Difficulty retargeting
//! - Blocks (header plus transactions, mint tx last)
//! - Recent header ids and the in-memory header chain
//! - The live spendable-output map
//! - Transaction building and signing

pub mod block;
pub mod difficulty;
pub mod header;
pub mod lch;
pub mod transaction;
pub mod tx_builder;
pub mod tx_out_bn_map;
pub mod tx_signer;

pub use block::{mint_amount, Block, COIN, HALVING_INTERVAL, INITIAL_MINT_AMOUNT, MAX_BLOCK_TXS};
pub use difficulty::{
    difficulty_from_target, retarget, target_from_difficulty, target_with_leading_zeros,
    EXPECTED_PERIOD_SECS, RETARGET_PERIOD, TARGET_BLOCK_INTERVAL_SECS,
};
pub use header::{
    current_timestamp, Header, HeaderError, HEADER_SIZE, HEADER_VERSION, MAX_FUTURE_DRIFT_SECS,
    WORK_PAR_ALGO_1627, WORK_PAR_ALGO_NULL, WORK_SER_ALGO_BLAKE3, WORK_SER_ALGO_BLAKE3_2,
    WORK_SER_ALGO_BLAKE3_3, WORK_SER_ALGO_NULL,
};
pub use lch::{HeaderChain, Lch10Ids, LCH_IDS_LEN};
pub use transaction::{Tx, TxIn, TxOut, MINT_OUT_NUM, TX_VERSION};
pub use tx_builder::{TxBuilder, TxBuilderError};
pub use tx_out_bn_map::{OutPoint, TxOutBn, TxOutBnMap};
pub use tx_signer::{PkhKeyMap, TxSignError, TxSigner};
