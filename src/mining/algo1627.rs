//! Parallel proof-of-work hash `algo1627`
//!
//! The 384-byte input `working_id ++ reverse(lch10 ids) ++ working_id` is
//! read as 96 big-endian words (3072 bits). A virtual 1627 x 1627 matrix is
//! defined over it: element `(r, c)` is the 32 bits starting at bit
//! `((r * 1627 + c) * 1627) mod 3072`, read MSB-first and wrapping around
//! the end of the input. Each row is reduced to its wrapping sum, max, min
//! and xor, giving 6508 words. The parallel hash is the BLAKE3 of those
//! words in big-endian byte order.
//!
//! The three passes (bit-expand, row-reduce, byte-swap) map directly onto
//! GPU compute passes; here the matrix is never materialised and each row
//! is expanded on the fly.

use rayon::prelude::*;

use crate::codec::Buf32;
use crate::core::{Lch10Ids, LCH_IDS_LEN};
use crate::crypto::blake3_hash;

/// Matrix dimension
pub const ALGO1627_DIM: usize = 1627;

/// Input words: two working ids around ten lch ids
pub const INPUT_WORDS: usize = (2 + LCH_IDS_LEN) * 32 / 4;

/// Input length in bits
pub const INPUT_BITS: usize = INPUT_WORDS * 32;

/// Reduced output words: sum, max, min, xor per row
pub const REDUCED_WORDS: usize = ALGO1627_DIM * 4;

/// Matrix elements a GPU implementation materialises
pub const MATRIX_WORDS: usize = ALGO1627_DIM * ALGO1627_DIM;

pub type InputWords = [u32; INPUT_WORDS];

/// Executes the expand and reduce passes
pub trait Algo1627Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Row-interleaved `[sum, max, min, xor]` for every row
    fn reduce(&self, input: &InputWords) -> Vec<u32>;
}

/// Single-threaded reference implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl Algo1627Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn reduce(&self, input: &InputWords) -> Vec<u32> {
        let mut out = Vec::with_capacity(REDUCED_WORDS);
        for row in 0..ALGO1627_DIM {
            out.extend_from_slice(&reduce_row(input, row));
        }
        out
    }
}

/// Rows reduced in parallel on the rayon pool
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonBackend;

impl Algo1627Backend for RayonBackend {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn reduce(&self, input: &InputWords) -> Vec<u32> {
        let mut out = vec![0u32; REDUCED_WORDS];
        out.par_chunks_mut(4)
            .enumerate()
            .for_each(|(row, slot)| slot.copy_from_slice(&reduce_row(input, row)));
        out
    }
}

/// Build the 96-word input
pub fn input_words(working_id: &Buf32, lch10_ids: &Lch10Ids) -> InputWords {
    let mut bytes = Vec::with_capacity(INPUT_WORDS * 4);
    bytes.extend_from_slice(working_id.as_slice());
    for id in lch10_ids.reversed_padded().iter() {
        bytes.extend_from_slice(id.as_slice());
    }
    bytes.extend_from_slice(working_id.as_slice());

    let mut words = [0u32; INPUT_WORDS];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

/// Bit offset of matrix element `(row, col)`
pub fn bit_offset(row: usize, col: usize) -> usize {
    let index = (row * ALGO1627_DIM + col) as u64;
    ((index * ALGO1627_DIM as u64) % INPUT_BITS as u64) as usize
}

/// 32 bits starting at `offset`, wrapping past the last word
pub fn extract_word(input: &InputWords, offset: usize) -> u32 {
    let i = offset / 32;
    let shift = offset % 32;
    let hi = input[i] as u64;
    let lo = input[(i + 1) % INPUT_WORDS] as u64;
    (((hi << 32) | lo) >> (32 - shift)) as u32
}

pub fn reduce_row(input: &InputWords, row: usize) -> [u32; 4] {
    let mut sum = 0u32;
    let mut max = 0u32;
    let mut min = u32::MAX;
    let mut xor = 0u32;
    for col in 0..ALGO1627_DIM {
        let v = extract_word(input, bit_offset(row, col));
        sum = sum.wrapping_add(v);
        max = max.max(v);
        min = min.min(v);
        xor ^= v;
    }
    [sum, max, min, xor]
}

/// Byte-swap pass: words to big-endian bytes
pub fn reduced_to_bytes(reduced: &[u32]) -> Vec<u8> {
    reduced.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Parallel work hash of a working header id
pub fn algo1627(backend: &dyn Algo1627Backend, working_id: &Buf32, lch10_ids: &Lch10Ids) -> Buf32 {
    let input = input_words(working_id, lch10_ids);
    let reduced = backend.reduce(&input);
    blake3_hash(&reduced_to_bytes(&reduced))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bit(input: &InputWords, index: usize) -> u32 {
        let index = index % INPUT_BITS;
        (input[index / 32] >> (31 - index % 32)) & 1
    }

    fn naive_extract(input: &InputWords, offset: usize) -> u32 {
        (0..32).fold(0u32, |acc, k| (acc << 1) | bit(input, offset + k))
    }

    fn sample_input() -> InputWords {
        let lch = Lch10Ids::new((1..=10).map(Buf32::filled).collect()).unwrap();
        input_words(&Buf32::filled(0xA5), &lch)
    }

    #[test]
    fn test_sizes() {
        assert_eq!(INPUT_WORDS, 96);
        assert_eq!(INPUT_BITS, 3072);
        assert_eq!(REDUCED_WORDS, 6508);
        assert_eq!(MATRIX_WORDS, 2_647_129);
    }

    #[test]
    fn test_input_layout() {
        let id = Buf32::filled(0xA5);
        let lch = Lch10Ids::new(vec![Buf32::filled(1), Buf32::filled(2)]).unwrap();
        let words = input_words(&id, &lch);
        assert_eq!(words[0], 0xA5A5_A5A5);
        // Newest lch id first
        assert_eq!(words[8], 0x0202_0202);
        assert_eq!(words[16], 0x0101_0101);
        // Zero padding for missing ids
        assert_eq!(words[24], 0);
        assert_eq!(words[88], 0xA5A5_A5A5);
        assert_eq!(words[95], 0xA5A5_A5A5);
    }

    #[test]
    fn test_extract_matches_bitwise_reference() {
        let input = sample_input();
        for offset in [0, 1, 7, 31, 32, 33, 1000, 3040, 3041, 3063, 3071] {
            assert_eq!(
                extract_word(&input, offset),
                naive_extract(&input, offset),
                "offset {}",
                offset
            );
        }
    }

    #[test]
    fn test_bit_offsets() {
        assert_eq!(bit_offset(0, 0), 0);
        assert_eq!(bit_offset(0, 1), 1627);
        assert_eq!(bit_offset(0, 2), (2 * 1627) % 3072);
        assert_eq!(bit_offset(1, 0), (1627 * 1627) % 3072);
        assert!(bit_offset(1626, 1626) < INPUT_BITS);
    }

    #[test]
    fn test_reduce_row_reference() {
        let input = sample_input();
        for row in [0, 1, 800, 1626] {
            let values: Vec<u32> = (0..ALGO1627_DIM)
                .map(|c| naive_extract(&input, bit_offset(row, c)))
                .collect();
            let expected = [
                values.iter().fold(0u32, |a, v| a.wrapping_add(*v)),
                *values.iter().max().unwrap(),
                *values.iter().min().unwrap(),
                values.iter().fold(0u32, |a, v| a ^ v),
            ];
            assert_eq!(reduce_row(&input, row), expected);
        }
    }

    #[test]
    fn test_backends_agree() {
        let input = sample_input();
        let cpu = CpuBackend.reduce(&input);
        let par = RayonBackend.reduce(&input);
        assert_eq!(cpu.len(), REDUCED_WORDS);
        assert_eq!(cpu, par);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let lch = Lch10Ids::new(vec![Buf32::filled(9)]).unwrap();
        let id = Buf32::filled(3);
        let a = algo1627(&CpuBackend, &id, &lch);
        let b = algo1627(&RayonBackend, &id, &lch);
        assert_eq!(a, b);
        assert_eq!(a, algo1627(&CpuBackend, &id, &lch));
    }

    #[test]
    fn test_hash_depends_on_inputs() {
        let lch = Lch10Ids::new(vec![Buf32::filled(9), Buf32::filled(8)]).unwrap();
        let swapped = Lch10Ids::new(vec![Buf32::filled(8), Buf32::filled(9)]).unwrap();
        let id = Buf32::filled(3);
        let base = algo1627(&RayonBackend, &id, &lch);
        assert_ne!(base, algo1627(&RayonBackend, &id, &swapped));
        assert_ne!(base, algo1627(&RayonBackend, &Buf32::filled(4), &lch));
    }

    #[test]
    fn test_reduced_to_bytes() {
        assert_eq!(
            reduced_to_bytes(&[0x0102_0304, 0xAABB_CCDD]),
            vec![1, 2, 3, 4, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }
}
