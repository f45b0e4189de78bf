//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - BLAKE3 hashing (single, double, keyed)
//! - ECDSA key management (secp256k1)
//! - Merkle root and inclusion proof calculation

pub mod hash;
pub mod keys;
pub mod merkle;

pub use hash::{
    blake3_hash, blake3_hash_rounds, blake3_mac, double_blake3_hash, double_blake3_hex,
    hash_meets_target,
};
pub use keys::{
    address_to_pkh, pkh_from_pub_key, pkh_to_address, sign_digest, verify_digest, KeyError,
    KeyPair, Pkh, COMPACT_SIG_SIZE, PUB_KEY_SIZE,
};
pub use merkle::{
    calculate_merkle_root, generate_proofs_and_root, merkle_parent, verify_proof, MerkleError,
    MerkleProof, MerkleStep,
};
