//! Dual proof of work: serial `blake3_3` plus parallel `algo1627`
//!
//! Both hashes are computed over the working id, the id of the header with
//! its nonce set and both work hashes zeroed. The final header id, over the
//! header with the work hashes filled in, is what gets compared to targets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::algo1627::{algo1627, Algo1627Backend, CpuBackend};
use crate::codec::Buf32;
use crate::core::{Header, Lch10Ids, WORK_PAR_ALGO_1627, WORK_SER_ALGO_BLAKE3_3};
use crate::crypto::{blake3_hash_rounds, hash_meets_target};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowError {
    #[error("Unsupported serial work algorithm: {0}")]
    UnsupportedSerAlgo(u32),
    #[error("Unsupported parallel work algorithm: {0}")]
    UnsupportedParAlgo(u32),
    #[error("Serial work hash is null")]
    NullSerHash,
    #[error("Parallel work hash is null")]
    NullParHash,
    #[error("Serial work hash does not match")]
    SerHashMismatch,
    #[error("Parallel work hash does not match")]
    ParHashMismatch,
}

/// Outcome of checking a worked header against pool and block targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShareCheck {
    pub is_valid_share: bool,
    pub is_valid_block: bool,
}

/// Fail before any hashing if either declared algorithm is unsupported
pub fn check_work_algos(header: &Header) -> Result<(), PowError> {
    if header.work_ser_algo != WORK_SER_ALGO_BLAKE3_3 {
        return Err(PowError::UnsupportedSerAlgo(header.work_ser_algo));
    }
    if header.work_par_algo != WORK_PAR_ALGO_1627 {
        return Err(PowError::UnsupportedParAlgo(header.work_par_algo));
    }
    Ok(())
}

/// `blake3(blake3(blake3(working_id)))`
pub fn blake3_3(working_id: &Buf32) -> Buf32 {
    blake3_hash_rounds(working_id.as_slice(), 3)
}

/// Copy of `header` with `nonce` set and both work hashes computed
pub fn work_header(
    backend: &dyn Algo1627Backend,
    header: &Header,
    lch10_ids: &Lch10Ids,
    nonce: Buf32,
) -> Result<Header, PowError> {
    check_work_algos(header)?;
    let mut worked = header.working_header(nonce);
    let working_id = worked.id();
    worked.work_ser_hash = blake3_3(&working_id);
    worked.work_par_hash = algo1627(backend, &working_id, lch10_ids);
    Ok(worked)
}

/// Recompute both work hashes of `header` and compare with the stored ones
pub fn verify_work_pack_pow_with(
    backend: &dyn Algo1627Backend,
    header: &Header,
    lch10_ids: &Lch10Ids,
) -> Result<(), PowError> {
    check_work_algos(header)?;
    if header.work_ser_hash.is_zero() {
        return Err(PowError::NullSerHash);
    }
    if header.work_par_hash.is_zero() {
        return Err(PowError::NullParHash);
    }
    let working_id = header.working_id();
    if blake3_3(&working_id) != header.work_ser_hash {
        return Err(PowError::SerHashMismatch);
    }
    if algo1627(backend, &working_id, lch10_ids) != header.work_par_hash {
        return Err(PowError::ParHashMismatch);
    }
    Ok(())
}

pub fn verify_work_pack_pow(header: &Header, lch10_ids: &Lch10Ids) -> Result<(), PowError> {
    verify_work_pack_pow_with(&CpuBackend, header, lch10_ids)
}

/// Compare a worked header's id against both targets; no hashing of work
pub fn check_targets(header: &Header, share_target: &Buf32) -> ShareCheck {
    let id = header.id();
    ShareCheck {
        is_valid_share: hash_meets_target(&id, share_target),
        is_valid_block: hash_meets_target(&id, &header.target),
    }
}

/// Full coordinator-side check of a submitted header
pub fn check_share(
    backend: &dyn Algo1627Backend,
    header: &Header,
    lch10_ids: &Lch10Ids,
    share_target: &Buf32,
) -> Result<ShareCheck, PowError> {
    verify_work_pack_pow_with(backend, header, lch10_ids)?;
    Ok(check_targets(header, share_target))
}

// =============================================================================
// Tests
// =============================================================================
