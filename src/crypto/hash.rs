//! BLAKE3 hashing utilities for the ledger
//!
//! Every content hash in the system goes through these functions: header
//! and transaction ids, Merkle nodes, signature digests and the PoW stages.

use crate::codec::Buf32;

/// Computes the BLAKE3 hash of the input data
pub fn blake3_hash(data: &[u8]) -> Buf32 {
    Buf32::new(*blake3::hash(data).as_bytes())
}

/// Computes BLAKE3 of BLAKE3 of the input
/// Used for header ids, tx ids and Merkle nodes
pub fn double_blake3_hash(data: &[u8]) -> Buf32 {
    blake3_hash(blake3_hash(data).as_slice())
}

/// Applies BLAKE3 `rounds` times in sequence
pub fn blake3_hash_rounds(data: &[u8], rounds: usize) -> Buf32 {
    let mut out = blake3_hash(data);
    for _ in 1..rounds {
        out = blake3_hash(out.as_slice());
    }
    out
}

/// Keyed BLAKE3 message authentication code
pub fn blake3_mac(key: &Buf32, data: &[u8]) -> Buf32 {
    Buf32::new(*blake3::keyed_hash(key.as_bytes(), data).as_bytes())
}

/// Double hash returned as a hex string
pub fn double_blake3_hex(data: &[u8]) -> String {
    double_blake3_hash(data).to_hex()
}

/// Checks whether a hash, read as a big-endian integer, is strictly below target
pub fn hash_meets_target(hash: &Buf32, target: &Buf32) -> bool {
    hash < target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_known_vector() {
        // BLAKE3 of the empty input
        assert_eq!(
            blake3_hash(b"").to_hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_double_and_rounds() {
        let data = b"hello world";
        let once = blake3_hash(data);
        let twice = double_blake3_hash(data);
        assert_eq!(twice, blake3_hash(once.as_slice()));
        assert_eq!(blake3_hash_rounds(data, 1), once);
        assert_eq!(blake3_hash_rounds(data, 2), twice);
        assert_eq!(
            blake3_hash_rounds(data, 3),
            blake3_hash(twice.as_slice())
        );
    }

    #[test]
    fn test_mac_depends_on_key() {
        let data = b"payload";
        let a = blake3_mac(&Buf32::filled(1), data);
        let b = blake3_mac(&Buf32::filled(2), data);
        assert_ne!(a, b);
        assert_eq!(a, blake3_mac(&Buf32::filled(1), data));
    }

    #[test]
    fn test_hash_meets_target() {
        let mut target = [0u8; 32];
        target[1] = 0x10;
        let target = Buf32::new(target);

        let mut low = [0u8; 32];
        low[1] = 0x0F;
        assert!(hash_meets_target(&Buf32::new(low), &target));
        assert!(!hash_meets_target(&target, &target));
        assert!(!hash_meets_target(&Buf32::filled(0xFF), &target));
    }
}
