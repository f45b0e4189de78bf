//! Target arithmetic and difficulty retargeting
//!
//! Targets are 256-bit big-endian integers. A header id is valid when it is
//! numerically below its target, so a smaller target is harder.

use primitive_types::{U256, U512};

use crate::codec::Buf32;

// =============================================================================
// Retarget Constants
// =============================================================================

/// Blocks between difficulty adjustments
pub const RETARGET_PERIOD: u64 = 2016;

/// Desired seconds between blocks
pub const TARGET_BLOCK_INTERVAL_SECS: u64 = 600;

/// Elapsed time is clamped to `[expected / 4, expected * 4]`
pub const MAX_ADJUSTMENT_FACTOR: u64 = 4;

/// Seconds the period is expected to take (2015 intervals between the two ends)
pub const EXPECTED_PERIOD_SECS: u64 = (RETARGET_PERIOD - 1) * TARGET_BLOCK_INTERVAL_SECS;

pub fn target_to_u256(target: &Buf32) -> U256 {
    U256::from_big_endian(target.as_slice())
}

pub fn u256_to_target(value: U256) -> Buf32 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    Buf32::new(bytes)
}

/// Heights at which the target is recomputed
pub fn is_retarget_height(block_num: u64) -> bool {
    block_num > 0 && block_num % RETARGET_PERIOD == 0
}

/// Block number of the header that opens the period ending before `block_num`
pub fn adjustment_block_num(block_num: u64) -> Option<u64> {
    if is_retarget_height(block_num) {
        Some(block_num - RETARGET_PERIOD)
    } else {
        None
    }
}

/// Scale `old_target` by how long the last period actually took
pub fn retarget(old_target: &Buf32, elapsed_secs: u64) -> Buf32 {
    let min = EXPECTED_PERIOD_SECS / MAX_ADJUSTMENT_FACTOR;
    let max = EXPECTED_PERIOD_SECS * MAX_ADJUSTMENT_FACTOR;
    let elapsed = elapsed_secs.clamp(min, max);

    let scaled: U512 = target_to_u256(old_target).full_mul(U256::from(elapsed))
        / U512::from(EXPECTED_PERIOD_SECS);
    let new_target = U256::try_from(scaled).unwrap_or(U256::MAX);

    log::info!(
        "Retarget: elapsed {}s (clamped {}s, expected {}s)",
        elapsed_secs,
        elapsed,
        EXPECTED_PERIOD_SECS
    );
    u256_to_target(new_target)
}

/// `MAX / target`; a zero target is infinitely hard and maps to `MAX`
pub fn difficulty_from_target(target: &Buf32) -> U256 {
    let t = target_to_u256(target);
    if t.is_zero() {
        U256::MAX
    } else {
        U256::MAX / t
    }
}

/// Inverse of [`difficulty_from_target`]
pub fn target_from_difficulty(difficulty: U256) -> Buf32 {
    if difficulty.is_zero() {
        u256_to_target(U256::MAX)
    } else {
        u256_to_target(U256::MAX / difficulty)
    }
}

/// Target with `zero_bits` leading zero bits and every other bit set
pub fn target_with_leading_zeros(zero_bits: u32) -> Buf32 {
    if zero_bits >= 256 {
        Buf32::zero()
    } else {
        u256_to_target(U256::MAX >> zero_bits as usize)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retarget_heights() {
        assert!(!is_retarget_height(0));
        assert!(!is_retarget_height(2015));
        assert!(is_retarget_height(2016));
        assert!(is_retarget_height(4032));
        assert_eq!(adjustment_block_num(2016), Some(0));
        assert_eq!(adjustment_block_num(4032), Some(2016));
        assert_eq!(adjustment_block_num(4033), None);
    }

    #[test]
    fn test_retarget_on_schedule_keeps_target() {
        let old = target_with_leading_zeros(20);
        assert_eq!(retarget(&old, EXPECTED_PERIOD_SECS), old);
    }

    #[test]
    fn test_retarget_halves_and_doubles() {
        let old = target_with_leading_zeros(20);
        let old_v = target_to_u256(&old);

        let faster = target_to_u256(&retarget(&old, EXPECTED_PERIOD_SECS / 2));
        assert_eq!(faster, old_v / 2);

        let slower = target_to_u256(&retarget(&old, EXPECTED_PERIOD_SECS * 2));
        assert_eq!(slower, old_v * 2);
    }

    #[test]
    fn test_retarget_is_clamped() {
        let old = target_with_leading_zeros(20);
        let old_v = target_to_u256(&old);

        let too_fast = target_to_u256(&retarget(&old, 0));
        assert_eq!(too_fast, old_v / 4);

        let too_slow = target_to_u256(&retarget(&old, u64::MAX));
        assert_eq!(too_slow, old_v * 4);
    }

    #[test]
    fn test_retarget_caps_at_max() {
        let easy = target_with_leading_zeros(1);
        let new = retarget(&easy, EXPECTED_PERIOD_SECS * 4);
        assert_eq!(new, Buf32::filled(0xFF));
    }

    #[test]
    fn test_difficulty_from_target() {
        assert_eq!(difficulty_from_target(&Buf32::zero()), U256::MAX);
        assert_eq!(difficulty_from_target(&Buf32::filled(0xFF)), U256::one());

        let easy = difficulty_from_target(&target_with_leading_zeros(8));
        let hard = difficulty_from_target(&target_with_leading_zeros(16));
        assert!(hard > easy);
        assert_eq!(easy, U256::from(256));
    }

    #[test]
    fn test_target_from_difficulty() {
        let target = target_with_leading_zeros(8);
        let d = difficulty_from_target(&target);
        assert_eq!(target_from_difficulty(d), target);
        assert_eq!(target_from_difficulty(U256::zero()), Buf32::filled(0xFF));
    }

    #[test]
    fn test_target_with_leading_zeros() {
        let t = target_with_leading_zeros(12);
        assert_eq!(t.as_slice()[0], 0x00);
        assert_eq!(t.as_slice()[1], 0x0F);
        assert_eq!(t.as_slice()[31], 0xFF);
        assert!(target_with_leading_zeros(256).is_zero());
    }
}
