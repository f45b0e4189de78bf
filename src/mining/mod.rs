//! Mining: the dual proof-of-work protocol and the loop that drives it
//!
//! - `algo1627`: parallel work hash with pluggable backends
//! - `pow`: work pack verification and share checks
//! - `coordinator`: work pack source/sink, with an in-process implementation
//! - `miner`: per-device async mining loop

pub mod algo1627;
pub mod config;
pub mod coordinator;
pub mod miner;
pub mod pow;
pub mod work_pack;

pub use algo1627::{algo1627, Algo1627Backend, CpuBackend, RayonBackend, ALGO1627_DIM};
pub use config::{ConfigError, MinerConfig, ParallelBackend};
pub use coordinator::{
    Coordinator, CoordinatorError, LocalCoordinator, PostWorkPackResponse, WorkPackResponse,
    MAX_ISSUED_WORK,
};
pub use miner::{
    increment_nonce, run_devices, search_work_pack, Miner, MinerReport, MiningStats,
    SearchOutcome, SearchResult,
};
pub use pow::{
    blake3_3, check_share, check_targets, check_work_algos, verify_work_pack_pow,
    verify_work_pack_pow_with, work_header, PowError, ShareCheck,
};
pub use work_pack::WorkPack;
