//! Consensus validation of transactions and blocks
//!
//! - Mint transaction rules
//! - Transaction verification against the spendable-output map
//! - Block verification: header rules, Merkle root, sequential tx fold

pub mod block_verifier;
pub mod mint;
pub mod tx_verifier;

pub use block_verifier::{BlockRejection, BlockVerifier};
pub use mint::is_valid_mint_tx;
pub use tx_verifier::{TxRejection, TxVerifier};
