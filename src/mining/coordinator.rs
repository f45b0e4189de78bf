//! Coordinator protocol
//!
//! A coordinator hands out work packs with a share target and re-verifies
//! the headers miners send back. [`LocalCoordinator`] is an in-process
//! implementation that issues work on top of its own header chain and
//! extends the chain whenever a submission meets the block target.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use super::algo1627::{Algo1627Backend, RayonBackend};
use super::pow::{check_share, PowError, ShareCheck};
use super::work_pack::WorkPack;
use crate::codec::Buf32;
use crate::core::{
    current_timestamp, mint_amount, Block, HeaderChain, HeaderError, Tx, TxOut, TxOutBnMap,
};
use crate::crypto::calculate_merkle_root;
use crate::script::Script;
use crate::verify::BlockVerifier;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Unknown share id: {0}")]
    UnknownShare(u64),
    #[error("Share already submitted: {0}")]
    DuplicateShare(u64),
    #[error("Submitted header does not match the issued work")]
    HeaderMismatch,
    #[error("Proof of work rejected: {0}")]
    Pow(#[from] PowError),
    #[error("Header error: {0}")]
    Header(#[from] HeaderError),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Work issued to a miner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkPackResponse {
    pub share_id: u64,
    /// Submissions that miss the share target but beat this still count
    pub retry_target: Buf32,
    pub share_target: Buf32,
    pub work_pack: WorkPack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWorkPackResponse {
    pub share_id: u64,
    pub is_valid_share: bool,
    pub is_valid_block: bool,
}

#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn get_work_pack(&self) -> Result<WorkPackResponse, CoordinatorError>;

    /// Submit a worked header; `count` nonces were tried in `duration_ms`
    async fn post_work_pack(
        &self,
        share_id: u64,
        work_pack: &WorkPack,
        count: u64,
        duration_ms: u64,
    ) -> Result<PostWorkPackResponse, CoordinatorError>;
}

// =============================================================================
// LocalCoordinator
// =============================================================================

/// Outstanding work packs kept by default before the oldest is dropped
pub const MAX_ISSUED_WORK: usize = 1024;

struct IssuedWork {
    work_pack: WorkPack,
    block: Block,
    submitted: bool,
}

struct LocalState {
    chain: HeaderChain,
    tx_out_bn_map: TxOutBnMap,
    issued: HashMap<u64, IssuedWork>,
    issued_order: VecDeque<u64>,
    next_share_id: u64,
    found_blocks: Vec<Block>,
    valid_shares: u64,
    hash_count: u64,
}

/// In-process coordinator mining on its own chain
pub struct LocalCoordinator {
    state: Mutex<LocalState>,
    mint_script: Script,
    share_target: Buf32,
    retry_target: Buf32,
    max_issued: usize,
    backend: Arc<dyn Algo1627Backend>,
}

impl LocalCoordinator {
    /// Start from `genesis`; block rewards are paid to `mint_script`
    pub fn new(genesis: Block, mint_script: Script) -> Self {
        let mut tx_out_bn_map = TxOutBnMap::new();
        tx_out_bn_map.apply_block(&genesis);
        let share_target = genesis.header.target;
        Self {
            state: Mutex::new(LocalState {
                chain: HeaderChain::new(genesis.header),
                tx_out_bn_map,
                issued: HashMap::new(),
                issued_order: VecDeque::new(),
                next_share_id: 1,
                found_blocks: Vec::new(),
                valid_shares: 0,
                hash_count: 0,
            }),
            mint_script,
            share_target,
            retry_target: share_target,
            max_issued: MAX_ISSUED_WORK,
            backend: Arc::new(RayonBackend),
        }
    }

    /// Target a submission must beat to count as a share
    pub fn with_share_target(mut self, share_target: Buf32) -> Self {
        self.share_target = share_target;
        self
    }

    pub fn with_retry_target(mut self, retry_target: Buf32) -> Self {
        self.retry_target = retry_target;
        self
    }

    /// Cap on outstanding work packs; at least one is always kept
    pub fn with_max_issued_work(mut self, max_issued: usize) -> Self {
        self.max_issued = max_issued.max(1);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn Algo1627Backend>) -> Self {
        self.backend = backend;
        self
    }

    pub async fn height(&self) -> u64 {
        self.state.lock().await.chain.height()
    }

    pub async fn found_blocks(&self) -> Vec<Block> {
        self.state.lock().await.found_blocks.clone()
    }

    pub async fn valid_shares(&self) -> u64 {
        self.state.lock().await.valid_shares
    }

    pub async fn hash_count(&self) -> u64 {
        self.state.lock().await.hash_count
    }

    /// Work packs that can still be submitted
    pub async fn outstanding_work(&self) -> usize {
        self.state.lock().await.issued.len()
    }

    pub async fn tx_out_bn_map(&self) -> TxOutBnMap {
        self.state.lock().await.tx_out_bn_map.clone()
    }

    pub async fn chain(&self) -> HeaderChain {
        self.state.lock().await.chain.clone()
    }

    fn block_template(&self, chain: &HeaderChain) -> Result<Block, CoordinatorError> {
        let block_num = chain.height() + 1;
        let mint = Tx::mint(
            block_num,
            b"local",
            vec![TxOut::new(mint_amount(block_num), self.mint_script.clone())],
        );
        let merkle_root = calculate_merkle_root(&[mint.id()])
            .map_err(|e| CoordinatorError::Transport(e.to_string()))?;
        let header = chain.new_child(merkle_root, current_timestamp())?;
        Ok(Block::new(header, vec![mint]))
    }

    /// Append a worked block if it still extends the tip
    async fn accept_block(&self, block: Block) -> bool {
        let mut state = self.state.lock().await;
        let now = current_timestamp().max(block.header.timestamp);
        let valid = BlockVerifier::new(&block, &state.tx_out_bn_map, &state.chain).is_valid_at(now);
        if !valid || block.header.prev_block_id != state.chain.tip().id() {
            warn!("Dropping stale or invalid block {}", block.block_num());
            return false;
        }
        if let Err(e) = state.chain.push(block.header.clone(), now) {
            warn!("Block {} rejected by header chain: {}", block.block_num(), e);
            return false;
        }
        state.tx_out_bn_map.apply_block(&block);
        // Outstanding work now builds on a stale tip
        state.issued.clear();
        state.issued_order.clear();
        info!("Found block {} ({})", block.block_num(), block.id());
        state.found_blocks.push(block);
        true
    }
}

#[async_trait]
impl Coordinator for LocalCoordinator {
    async fn get_work_pack(&self) -> Result<WorkPackResponse, CoordinatorError> {
        let mut state = self.state.lock().await;
        let block = self.block_template(&state.chain)?;
        let work_pack = WorkPack::new(block.header.clone(), state.chain.lch10_ids());
        let share_id = state.next_share_id;
        state.next_share_id += 1;
        state.issued.insert(
            share_id,
            IssuedWork {
                work_pack: work_pack.clone(),
                block,
                submitted: false,
            },
        );
        state.issued_order.push_back(share_id);
        while state.issued_order.len() > self.max_issued {
            if let Some(oldest) = state.issued_order.pop_front() {
                state.issued.remove(&oldest);
            }
        }
        Ok(WorkPackResponse {
            share_id,
            retry_target: self.retry_target,
            share_target: self.share_target,
            work_pack,
        })
    }

    async fn post_work_pack(
        &self,
        share_id: u64,
        work_pack: &WorkPack,
        count: u64,
        duration_ms: u64,
    ) -> Result<PostWorkPackResponse, CoordinatorError> {
        let issued = {
            let mut state = self.state.lock().await;
            state.hash_count = state.hash_count.saturating_add(count);
            let issued = state
                .issued
                .get_mut(&share_id)
                .ok_or(CoordinatorError::UnknownShare(share_id))?;
            let expected = issued.work_pack.header.working_header(Buf32::zero());
            if work_pack.header.working_header(Buf32::zero()) != expected
                || work_pack.lch10_ids != issued.work_pack.lch10_ids
            {
                return Err(CoordinatorError::HeaderMismatch);
            }
            if issued.submitted {
                return Err(CoordinatorError::DuplicateShare(share_id));
            }
            // Claimed before the unlocked PoW check so a concurrent resend is refused
            issued.submitted = true;
            issued.block.clone()
        };

        let backend = self.backend.clone();
        let submitted = work_pack.clone();
        let share_target = self.share_target;
        let result = tokio::task::spawn_blocking(move || {
            check_share(
                backend.as_ref(),
                &submitted.header,
                &submitted.lch10_ids,
                &share_target,
            )
        })
        .await
        .map_err(|e| CoordinatorError::Transport(e.to_string()))
        .and_then(|r| r.map_err(CoordinatorError::from));
        let check: ShareCheck = match result {
            Ok(check) => check,
            Err(e) => {
                // A bad submission does not use up the work pack
                if let Some(issued) = self.state.lock().await.issued.get_mut(&share_id) {
                    issued.submitted = false;
                }
                return Err(e);
            }
        };

        debug!(
            "Share {}: {} hashes in {}ms, share={} block={}",
            share_id,
            count,
            duration_ms,
            check.is_valid_share,
            check.is_valid_block
        );

        if check.is_valid_share {
            self.state.lock().await.valid_shares += 1;
        }
        let is_valid_block = if check.is_valid_block {
            let block = Block::new(work_pack.header.clone(), issued.txs);
            self.accept_block(block).await
        } else {
            false
        };

        Ok(PostWorkPackResponse {
            share_id,
            is_valid_share: check.is_valid_share,
            is_valid_block,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
