//! Dual-PoW Ledger: consensus core for a dual proof-of-work cryptocurrency
//!
//! This crate provides:
//! - A big-endian byte codec with minimal var-ints
//! - BLAKE3 hashing, secp256k1 keys and Merkle trees
//! - A stack-based script interpreter with signature hashing
//! - Transactions, headers, blocks and target retargeting
//! - Transaction and block verification against a spendable-output map
//! - Dual proof of work (serial `blake3_3` + parallel `algo1627`) and an
//!   async mining loop
//!
//! # Example
//!
//! ```rust
//! use dualpow_ledger::codec::Buf32;
//! use dualpow_ledger::core::{mint_amount, Block, HeaderChain, TxOut, TxOutBnMap};
//! use dualpow_ledger::script::Script;
//! use dualpow_ledger::verify::BlockVerifier;
//!
//! let genesis = Block::genesis(
//!     1_700_000_000,
//!     Buf32::filled(0xFF),
//!     b"genesis",
//!     vec![TxOut::new(mint_amount(0), Script::empty())],
//! );
//! let mut map = TxOutBnMap::new();
//! map.apply_block(&genesis);
//! let chain = HeaderChain::new(genesis.header.clone());
//! assert_eq!(chain.height(), 0);
//! assert!(genesis.verify_merkle_root());
//! # let _ = BlockVerifier::new(&genesis, &map, &chain);
//! ```

pub mod codec;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod script;
pub mod verify;

// Re-export commonly used types
pub use codec::{BufError, Buf32};
pub use core::{Block, Header, HeaderChain, Tx, TxIn, TxOut, TxOutBnMap};
pub use crypto::KeyPair;
pub use mining::{LocalCoordinator, Miner, MinerConfig, WorkPack};
pub use script::{Interpreter, Script};
pub use verify::{BlockVerifier, TxVerifier};
