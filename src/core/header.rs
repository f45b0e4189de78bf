//! Block header and header consensus rules
//!
//! A header is a fixed 217-byte record committing to the previous block,
//! the Merkle root of the block's transactions, the target and the two
//! proof-of-work hashes.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::difficulty::{self, adjustment_block_num, is_retarget_height};
use crate::codec::{self, BufError, BufReader, BufWriter, Buf32};
use crate::crypto::{double_blake3_hash, hash_meets_target};

// =============================================================================
// Header Constants
// =============================================================================

/// Current header version
pub const HEADER_VERSION: u8 = 1;

/// Serialized header size in bytes
pub const HEADER_SIZE: usize = 1 + 32 + 32 + 8 + 8 + 32 + 32 + 4 + 4 + 32 + 32;

/// Seconds a header timestamp may run ahead of the local clock
pub const MAX_FUTURE_DRIFT_SECS: u64 = 7200;

pub const WORK_SER_ALGO_NULL: u32 = 0;
pub const WORK_SER_ALGO_BLAKE3: u32 = 1;
pub const WORK_SER_ALGO_BLAKE3_2: u32 = 2;
pub const WORK_SER_ALGO_BLAKE3_3: u32 = 3;

pub const WORK_PAR_ALGO_NULL: u32 = 0;
pub const WORK_PAR_ALGO_1627: u32 = 1627;

/// Name of a serial work algorithm id
pub fn work_ser_algo_name(id: u32) -> &'static str {
    match id {
        WORK_SER_ALGO_NULL => "null",
        WORK_SER_ALGO_BLAKE3 => "blake3",
        WORK_SER_ALGO_BLAKE3_2 => "blake3_2",
        WORK_SER_ALGO_BLAKE3_3 => "blake3_3",
        _ => "unknown",
    }
}

/// Name of a parallel work algorithm id
pub fn work_par_algo_name(id: u32) -> &'static str {
    match id {
        WORK_PAR_ALGO_NULL => "null",
        WORK_PAR_ALGO_1627 => "algo1627",
        _ => "unknown",
    }
}

/// Current wall clock in Unix seconds
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

// =============================================================================
// Header Errors
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Unsupported header version: {0}")]
    InvalidVersion(u8),
    #[error("Invalid block number: expected {expected}, got {actual}")]
    InvalidBlockNum { expected: u64, actual: u64 },
    #[error("Previous block id does not match")]
    PrevIdMismatch,
    #[error("Timestamp {actual} is earlier than previous header's {prev}")]
    TimestampTooEarly { prev: u64, actual: u64 },
    #[error("Timestamp {actual} is too far ahead of local time {now}")]
    TimestampTooFarInFuture { now: u64, actual: u64 },
    #[error("Target does not match the expected target")]
    TargetMismatch,
    #[error("Header id is not below its target")]
    IdAboveTarget,
    #[error("Missing adjustment header for block {0}")]
    MissingAdjustmentHeader(u64),
    #[error("Invalid transaction count: {0}")]
    InvalidTxCount(usize),
}

// =============================================================================
// Header
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u8,
    pub prev_block_id: Buf32,
    pub merkle_root: Buf32,
    /// Unix seconds
    pub timestamp: u64,
    pub block_num: u64,
    pub target: Buf32,
    pub nonce: Buf32,
    pub work_ser_algo: u32,
    pub work_par_algo: u32,
    pub work_ser_hash: Buf32,
    pub work_par_hash: Buf32,
}

impl Header {
    /// First header of a chain
    pub fn genesis(merkle_root: Buf32, timestamp: u64, initial_target: Buf32) -> Self {
        Self {
            version: HEADER_VERSION,
            prev_block_id: Buf32::zero(),
            merkle_root,
            timestamp,
            block_num: 0,
            target: initial_target,
            nonce: Buf32::zero(),
            work_ser_algo: WORK_SER_ALGO_BLAKE3_3,
            work_par_algo: WORK_PAR_ALGO_1627,
            work_ser_hash: Buf32::zero(),
            work_par_hash: Buf32::zero(),
        }
    }

    /// Unworked header following `prev`
    ///
    /// `adj` must be the header at `prev.block_num + 1 - RETARGET_PERIOD`
    /// when the new height is a retarget boundary, and is ignored otherwise.
    pub fn from_prev(
        prev: &Header,
        adj: Option<&Header>,
        merkle_root: Buf32,
        timestamp: u64,
    ) -> Result<Self, HeaderError> {
        Ok(Self {
            version: HEADER_VERSION,
            prev_block_id: prev.id(),
            merkle_root,
            timestamp,
            block_num: prev.block_num + 1,
            target: Self::next_target(prev, adj)?,
            nonce: Buf32::zero(),
            work_ser_algo: prev.work_ser_algo,
            work_par_algo: prev.work_par_algo,
            work_ser_hash: Buf32::zero(),
            work_par_hash: Buf32::zero(),
        })
    }

    /// Target required of the header following `prev`
    pub fn next_target(prev: &Header, adj: Option<&Header>) -> Result<Buf32, HeaderError> {
        let block_num = prev.block_num + 1;
        if !is_retarget_height(block_num) {
            return Ok(prev.target);
        }
        let adj_num = adjustment_block_num(block_num).unwrap_or_default();
        let adj = adj
            .filter(|h| h.block_num == adj_num)
            .ok_or(HeaderError::MissingAdjustmentHeader(block_num))?;
        let elapsed = prev.timestamp.saturating_sub(adj.timestamp);
        Ok(difficulty::retarget(&prev.target, elapsed))
    }

    pub fn is_genesis(&self) -> bool {
        self.block_num == 0 && self.prev_block_id.is_zero()
    }

    pub fn has_work(&self) -> bool {
        !self.work_ser_hash.is_zero() || !self.work_par_hash.is_zero()
    }

    pub fn work_ser_algo_str(&self) -> &'static str {
        work_ser_algo_name(self.work_ser_algo)
    }

    pub fn work_par_algo_str(&self) -> &'static str {
        work_par_algo_name(self.work_par_algo)
    }

    /// Copy of this header with `nonce` and both work hashes cleared
    pub fn working_header(&self, nonce: Buf32) -> Self {
        Self {
            nonce,
            work_ser_hash: Buf32::zero(),
            work_par_hash: Buf32::zero(),
            ..self.clone()
        }
    }

    /// Id of the working header for the current nonce
    pub fn working_id(&self) -> Buf32 {
        self.working_header(self.nonce).id()
    }

    /// Double BLAKE3 of the serialized header
    pub fn id(&self) -> Buf32 {
        double_blake3_hash(&self.to_buf())
    }

    pub fn id_meets_target(&self) -> bool {
        hash_meets_target(&self.id(), &self.target)
    }

    pub fn difficulty(&self) -> primitive_types::U256 {
        difficulty::difficulty_from_target(&self.target)
    }

    /// Check this header against its predecessor and, at retarget heights,
    /// the adjustment header. `now` is the local clock in Unix seconds.
    pub fn res_is_valid_at(
        &self,
        prev: &Header,
        adj: Option<&Header>,
        now: u64,
    ) -> Result<(), HeaderError> {
        if self.version != HEADER_VERSION {
            return Err(HeaderError::InvalidVersion(self.version));
        }
        let expected_num = prev.block_num + 1;
        if self.block_num != expected_num {
            return Err(HeaderError::InvalidBlockNum {
                expected: expected_num,
                actual: self.block_num,
            });
        }
        if self.prev_block_id != prev.id() {
            return Err(HeaderError::PrevIdMismatch);
        }
        if self.timestamp < prev.timestamp {
            return Err(HeaderError::TimestampTooEarly {
                prev: prev.timestamp,
                actual: self.timestamp,
            });
        }
        if self.timestamp > now.saturating_add(MAX_FUTURE_DRIFT_SECS) {
            return Err(HeaderError::TimestampTooFarInFuture {
                now,
                actual: self.timestamp,
            });
        }
        if self.target != Self::next_target(prev, adj)? {
            return Err(HeaderError::TargetMismatch);
        }
        if self.has_work() && !self.id_meets_target() {
            return Err(HeaderError::IdAboveTarget);
        }
        Ok(())
    }

    pub fn is_valid_at(&self, prev: &Header, adj: Option<&Header>, now: u64) -> bool {
        match self.res_is_valid_at(prev, adj, now) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Header {} rejected: {}", self.block_num, e);
                false
            }
        }
    }

    pub fn write_to(&self, w: &mut BufWriter) {
        w.write_u8(self.version)
            .write_fixed(&self.prev_block_id)
            .write_fixed(&self.merkle_root)
            .write_u64_be(self.timestamp)
            .write_u64_be(self.block_num)
            .write_fixed(&self.target)
            .write_fixed(&self.nonce)
            .write_u32_be(self.work_ser_algo)
            .write_u32_be(self.work_par_algo)
            .write_fixed(&self.work_ser_hash)
            .write_fixed(&self.work_par_hash);
    }

    pub fn read_from(r: &mut BufReader<'_>) -> Result<Self, BufError> {
        Ok(Self {
            version: r.read_u8()?,
            prev_block_id: r.read_fixed()?,
            merkle_root: r.read_fixed()?,
            timestamp: r.read_u64_be()?,
            block_num: r.read_u64_be()?,
            target: r.read_fixed()?,
            nonce: r.read_fixed()?,
            work_ser_algo: r.read_u32_be()?,
            work_par_algo: r.read_u32_be()?,
            work_ser_hash: r.read_fixed()?,
            work_par_hash: r.read_fixed()?,
        })
    }

    pub fn to_buf(&self) -> Vec<u8> {
        let mut w = BufWriter::new();
        self.write_to(&mut w);
        w.to_buf()
    }

    pub fn from_buf(buf: &[u8]) -> Result<Self, BufError> {
        if buf.len() != HEADER_SIZE {
            return Err(BufError::InvalidSize {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }
        let mut r = BufReader::new(buf);
        let header = Self::read_from(&mut r)?;
        r.finish()?;
        Ok(header)
    }

    pub fn to_hex(&self) -> String {
        codec::to_hex(&self.to_buf())
    }

    pub fn from_hex(s: &str) -> Result<Self, BufError> {
        Self::from_buf(&codec::from_hex(s)?)
    }
}

// =============================================================================
// Tests
// =============================================================================
