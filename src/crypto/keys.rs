//! ECDSA key management for the ledger
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve. Public keys travel as 33-byte compressed
//! points, signatures as 64-byte compact (r, s) pairs.

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::double_blake3_hash;
use crate::codec::{self, Buf32, FixedBuf};

/// Compressed public key length
pub const PUB_KEY_SIZE: usize = 33;

/// Compact ECDSA signature length
pub const COMPACT_SIG_SIZE: usize = 64;

/// Address version byte
pub const ADDRESS_VERSION: u8 = 0x00;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// Public key hash: double BLAKE3 of the compressed public key
pub type Pkh = Buf32;

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = codec::from_hex(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Compressed public key bytes
    pub fn pub_key_buf(&self) -> FixedBuf<PUB_KEY_SIZE> {
        FixedBuf::new(self.public_key.serialize())
    }

    pub fn pkh(&self) -> Pkh {
        pkh_from_pub_key(&self.public_key.serialize())
    }

    pub fn address(&self) -> String {
        pkh_to_address(&self.pkh())
    }

    /// Sign a 32-byte digest
    pub fn sign(&self, digest: &Buf32) -> FixedBuf<COMPACT_SIG_SIZE> {
        sign_digest(&self.secret_key, digest)
    }

    pub fn verify(&self, digest: &Buf32, signature: &[u8]) -> bool {
        verify_digest(&self.public_key.serialize(), digest, signature)
    }
}

pub fn pkh_from_pub_key(pub_key: &[u8]) -> Pkh {
    double_blake3_hash(pub_key)
}

/// Base58Check address: version byte, pkh, 4-byte double BLAKE3 checksum
pub fn pkh_to_address(pkh: &Pkh) -> String {
    let mut bytes = Vec::with_capacity(1 + 32 + 4);
    bytes.push(ADDRESS_VERSION);
    bytes.extend_from_slice(pkh.as_slice());
    let checksum = double_blake3_hash(&bytes);
    bytes.extend_from_slice(&checksum.as_slice()[..4]);
    codec::to_base58(&bytes)
}

pub fn address_to_pkh(address: &str) -> Result<Pkh, KeyError> {
    let bytes =
        codec::from_base58(address).map_err(|_| KeyError::InvalidAddress(address.to_string()))?;
    if bytes.len() != 1 + 32 + 4 || bytes[0] != ADDRESS_VERSION {
        return Err(KeyError::InvalidAddress(address.to_string()));
    }
    let (body, checksum) = bytes.split_at(33);
    if &double_blake3_hash(body).as_slice()[..4] != checksum {
        return Err(KeyError::InvalidAddress(address.to_string()));
    }
    Pkh::from_slice(&body[1..]).map_err(|_| KeyError::InvalidAddress(address.to_string()))
}

/// Sign a digest, returning the compact signature
pub fn sign_digest(secret_key: &SecretKey, digest: &Buf32) -> FixedBuf<COMPACT_SIG_SIZE> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(digest.into_inner());
    FixedBuf::new(secp.sign_ecdsa(&message, secret_key).serialize_compact())
}

/// Verify a compact signature over a digest against a compressed public key
///
/// Malformed keys or signatures verify as false.
pub fn verify_digest(pub_key: &[u8], digest: &Buf32, signature: &[u8]) -> bool {
    let secp = Secp256k1::verification_only();
    let Ok(public_key) = PublicKey::from_slice(pub_key) else {
        return false;
    };
    let Ok(sig) = Signature::from_compact(signature) else {
        return false;
    };
    let message = Message::from_digest(digest.into_inner());
    secp.verify_ecdsa(&message, &sig, &public_key).is_ok()
}
