//! Mining engine
//!
//! One [`Miner`] drives one device. A fetcher task keeps a short queue of
//! work packs filled, the nonce search runs on the blocking pool, and
//! results go to a submitter task so a slow coordinator never stalls the
//! search.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::algo1627::Algo1627Backend;
use super::config::{ConfigError, MinerConfig};
use super::coordinator::{Coordinator, WorkPackResponse};
use super::pow::{check_work_algos, work_header, PowError};
use super::work_pack::WorkPack;
use crate::codec::Buf32;
use crate::core::Header;
use crate::crypto::hash_meets_target;

/// Mining statistics
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(hash_attempts: u64, elapsed: Duration) -> Self {
        let time_ms = elapsed.as_millis();
        let hash_rate = if time_ms > 0 {
            (hash_attempts as f64) / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };
        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// How a work pack search ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Header id is below the share target
    Share(Header),
    /// Budget exhausted; best header still beats the retry target
    Retry(Header),
    /// Budget exhausted with nothing worth submitting
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub outcome: SearchOutcome,
    pub stats: MiningStats,
}

/// Add one to a nonce read as a big-endian integer, wrapping at the top
pub fn increment_nonce(nonce: &Buf32) -> Buf32 {
    let mut bytes = nonce.into_inner();
    for byte in bytes.iter_mut().rev() {
        let (next, overflow) = byte.overflowing_add(1);
        *byte = next;
        if !overflow {
            break;
        }
    }
    Buf32::new(bytes)
}

/// Search nonces for one work pack until a share is found or the budget runs out
///
/// Unsupported algorithm ids fail before any hashing.
pub fn search_work_pack(
    backend: &dyn Algo1627Backend,
    work: &WorkPackResponse,
    max_attempts: u64,
    timeout: Duration,
) -> Result<SearchResult, PowError> {
    let header = &work.work_pack.header;
    let lch10_ids = &work.work_pack.lch10_ids;
    check_work_algos(header)?;

    let start = Instant::now();
    let deadline = start + timeout;
    let mut nonce = Buf32::random();
    let mut best: Option<(Buf32, Header)> = None;
    let mut attempts = 0u64;

    while attempts < max_attempts {
        let worked = work_header(backend, header, lch10_ids, nonce)?;
        attempts += 1;
        let id = worked.id();
        if hash_meets_target(&id, &work.share_target) {
            return Ok(SearchResult {
                outcome: SearchOutcome::Share(worked),
                stats: MiningStats::new(attempts, start.elapsed()),
            });
        }
        if best.as_ref().map_or(true, |(best_id, _)| id < *best_id) {
            best = Some((id, worked));
        }
        if Instant::now() >= deadline {
            debug!("Work pack {} timed out after {} attempts", work.share_id, attempts);
            break;
        }
        nonce = increment_nonce(&nonce);
    }

    let outcome = match best {
        Some((id, header)) if hash_meets_target(&id, &work.retry_target) => {
            SearchOutcome::Retry(header)
        }
        _ => SearchOutcome::Exhausted,
    };
    Ok(SearchResult {
        outcome,
        stats: MiningStats::new(attempts, start.elapsed()),
    })
}

/// Totals for one miner run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerReport {
    pub work_packs: u64,
    pub hash_attempts: u64,
    pub submitted: u64,
    pub valid_shares: u64,
    pub valid_blocks: u64,
    pub rejected: u64,
    pub exhausted: u64,
}

struct Submission {
    share_id: u64,
    work_pack: WorkPack,
    count: u64,
    duration_ms: u64,
}

/// Miner for one device
pub struct Miner {
    device: usize,
    coordinator: Arc<dyn Coordinator>,
    config: MinerConfig,
    backend: Arc<dyn Algo1627Backend>,
}

impl Miner {
    /// Create a new miner
    pub fn new(
        device: usize,
        coordinator: Arc<dyn Coordinator>,
        config: MinerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let backend = config.parallel_backend.backend();
        Ok(Self {
            device,
            coordinator,
            config,
            backend,
        })
    }

    /// Replace the parallel hash backend, e.g. with a GPU implementation
    pub fn with_backend(mut self, backend: Arc<dyn Algo1627Backend>) -> Self {
        self.backend = backend;
        self
    }

    /// Mine until `shutdown` flips to true or `max_work_packs` is reached
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> MinerReport {
        info!(
            "Miner {} starting with {} backend",
            self.device,
            self.backend.name()
        );
        let (work_tx, mut work_rx) = mpsc::channel(self.config.work_queue_len);
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();

        let fetcher = self.spawn_fetcher(work_tx, shutdown.clone());
        let submitter = self.spawn_submitter(submit_rx);

        let mut report = MinerReport::default();
        let timeout = Duration::from_millis(self.config.header_timeout_ms);

        while !*shutdown.borrow() {
            if self
                .config
                .max_work_packs
                .is_some_and(|max| report.work_packs >= max)
            {
                break;
            }
            let work: WorkPackResponse = tokio::select! {
                work = work_rx.recv() => match work {
                    Some(work) => work,
                    None => break,
                },
                _ = shutdown.changed() => break,
            };

            let backend = self.backend.clone();
            let max_attempts = self.config.max_attempts_per_work_pack;
            let job = work.clone();
            let result = tokio::task::spawn_blocking(move || {
                search_work_pack(backend.as_ref(), &job, max_attempts, timeout)
            })
            .await;
            report.work_packs += 1;

            let result = match result {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    warn!("Miner {} skipping work pack {}: {}", self.device, work.share_id, e);
                    continue;
                }
                Err(e) => {
                    warn!("Miner {} search task failed: {}", self.device, e);
                    continue;
                }
            };
            report.hash_attempts += result.stats.hash_attempts;

            let header = match result.outcome {
                SearchOutcome::Share(header) | SearchOutcome::Retry(header) => header,
                SearchOutcome::Exhausted => {
                    debug!("Miner {} requesting fresh work", self.device);
                    report.exhausted += 1;
                    continue;
                }
            };
            let submission = Submission {
                share_id: work.share_id,
                work_pack: WorkPack::new(header, work.work_pack.lch10_ids),
                count: result.stats.hash_attempts,
                duration_ms: result.stats.time_ms as u64,
            };
            if submit_tx.send(submission).is_err() {
                warn!("Miner {} submitter stopped", self.device);
                break;
            }
            report.submitted += 1;
        }

        fetcher.abort();
        drop(work_rx);
        drop(submit_tx);
        match submitter.await {
            Ok((valid_shares, valid_blocks, rejected)) => {
                report.valid_shares = valid_shares;
                report.valid_blocks = valid_blocks;
                report.rejected = rejected;
            }
            Err(e) => warn!("Miner {} submitter failed: {}", self.device, e),
        }
        info!("Miner {} stopped: {:?}", self.device, report);
        report
    }

    fn spawn_fetcher(
        &self,
        work_tx: mpsc::Sender<WorkPackResponse>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let coordinator = self.coordinator.clone();
        let device = self.device;
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.refill_interval_ms));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => return,
                }
                loop {
                    let permit = match work_tx.try_reserve() {
                        Ok(permit) => permit,
                        Err(mpsc::error::TrySendError::Full(())) => break,
                        Err(mpsc::error::TrySendError::Closed(())) => return,
                    };
                    match coordinator.get_work_pack().await {
                        Ok(work) => permit.send(work),
                        Err(e) => {
                            warn!("Miner {} could not fetch work: {}", device, e);
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Posts results in order; returns (valid shares, valid blocks, rejected)
    fn spawn_submitter(
        &self,
        mut submit_rx: mpsc::UnboundedReceiver<Submission>,
    ) -> JoinHandle<(u64, u64, u64)> {
        let coordinator = self.coordinator.clone();
        let device = self.device;
        tokio::spawn(async move {
            let (mut shares, mut blocks, mut rejected) = (0u64, 0u64, 0u64);
            while let Some(s) = submit_rx.recv().await {
                match coordinator
                    .post_work_pack(s.share_id, &s.work_pack, s.count, s.duration_ms)
                    .await
                {
                    Ok(resp) => {
                        if resp.is_valid_share {
                            shares += 1;
                        }
                        if resp.is_valid_block {
                            blocks += 1;
                            info!(
                                "Miner {} found block {} ({})",
                                device,
                                s.work_pack.header.block_num,
                                s.work_pack.header.id()
                            );
                        }
                        debug!("Miner {} share {} result: {:?}", device, s.share_id, resp);
                    }
                    Err(e) => {
                        rejected += 1;
                        warn!("Miner {} share {} rejected: {}", device, s.share_id, e);
                    }
                }
            }
            (shares, blocks, rejected)
        })
    }
}

/// Run several miners side by side until shutdown
pub async fn run_devices(miners: &[Miner], shutdown: watch::Receiver<bool>) -> Vec<MinerReport> {
    join_all(miners.iter().map(|m| m.run(shutdown.clone()))).await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{current_timestamp, mint_amount, Block, Lch10Ids, TxOut, WORK_PAR_ALGO_NULL};
    use crate::mining::algo1627::RayonBackend;
    use crate::mining::config::ParallelBackend;
    use crate::mining::coordinator::LocalCoordinator;
    use crate::mining::pow::verify_work_pack_pow;
    use crate::script::Script;

    fn work(share_target: Buf32, retry_target: Buf32) -> WorkPackResponse {
        let header = Header::genesis(Buf32::filled(1), 10, Buf32::filled(0xFF));
        WorkPackResponse {
            share_id: 1,
            retry_target,
            share_target,
            work_pack: WorkPack::new(header, Lch10Ids::default()),
        }
    }

    fn local(target: Buf32) -> Arc<LocalCoordinator> {
        let genesis = Block::genesis(
            current_timestamp() - 60,
            target,
            b"genesis",
            vec![TxOut::new(mint_amount(0), Script::empty())],
        );
        Arc::new(LocalCoordinator::new(genesis, Script::empty()))
    }

    fn fast_config(max_work_packs: u64) -> MinerConfig {
        MinerConfig {
            work_queue_len: 2,
            refill_interval_ms: 10,
            header_timeout_ms: 5_000,
            max_attempts_per_work_pack: 3,
            parallel_backend: ParallelBackend::Rayon,
            max_work_packs: Some(max_work_packs),
        }
    }

    #[test]
    fn test_increment_nonce() {
        assert_eq!(increment_nonce(&Buf32::zero()).as_slice()[31], 1);
        let mut bytes = [0u8; 32];
        bytes[31] = 0xFF;
        let next = increment_nonce(&Buf32::new(bytes));
        assert_eq!(next.as_slice()[30], 1);
        assert_eq!(next.as_slice()[31], 0);
        assert_eq!(increment_nonce(&Buf32::filled(0xFF)), Buf32::zero());
    }

    #[test]
    fn test_search_finds_share() {
        let w = work(Buf32::filled(0xFF), Buf32::zero());
        let result = search_work_pack(&RayonBackend, &w, 10, Duration::from_secs(5)).unwrap();
        assert_eq!(result.stats.hash_attempts, 1);
        match result.outcome {
            SearchOutcome::Share(h) => {
                assert_eq!(verify_work_pack_pow(&h, &w.work_pack.lch10_ids), Ok(()));
            }
            other => panic!("expected share, got {:?}", other),
        }
    }

    #[test]
    fn test_search_exhausted() {
        let w = work(Buf32::zero(), Buf32::zero());
        let result = search_work_pack(&RayonBackend, &w, 2, Duration::from_secs(5)).unwrap();
        assert_eq!(result.outcome, SearchOutcome::Exhausted);
        assert_eq!(result.stats.hash_attempts, 2);
    }

    #[test]
    fn test_search_retry_target() {
        let w = work(Buf32::zero(), Buf32::filled(0xFF));
        let result = search_work_pack(&RayonBackend, &w, 2, Duration::from_secs(5)).unwrap();
        assert!(matches!(result.outcome, SearchOutcome::Retry(_)));
    }

    #[test]
    fn test_search_timeout() {
        let w = work(Buf32::zero(), Buf32::zero());
        let result = search_work_pack(&RayonBackend, &w, u64::MAX, Duration::ZERO).unwrap();
        assert_eq!(result.stats.hash_attempts, 1);
        assert_eq!(result.outcome, SearchOutcome::Exhausted);
    }

    #[test]
    fn test_search_unsupported_algo_fails_fast() {
        let mut w = work(Buf32::filled(0xFF), Buf32::filled(0xFF));
        w.work_pack.header.work_par_algo = WORK_PAR_ALGO_NULL;
        assert_eq!(
            search_work_pack(&RayonBackend, &w, 10, Duration::from_secs(5)).unwrap_err(),
            PowError::UnsupportedParAlgo(WORK_PAR_ALGO_NULL)
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let coordinator = local(Buf32::filled(0xFF));
        let config = MinerConfig {
            work_queue_len: 0,
            ..Default::default()
        };
        assert!(Miner::new(0, coordinator, config).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_miner_extends_chain() {
        let coordinator = local(Buf32::filled(0xFF));
        let miner = Miner::new(0, coordinator.clone(), fast_config(3)).unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let report = miner.run(shutdown_rx).await;
        assert_eq!(report.work_packs, 3);
        assert_eq!(report.submitted, 3);
        assert!(report.valid_shares >= 1);
        assert!(report.valid_blocks >= 1);
        assert_eq!(coordinator.height().await, report.valid_blocks);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_stops_miner() {
        let coordinator = local(Buf32::zero());
        let config = MinerConfig {
            max_work_packs: None,
            header_timeout_ms: 50,
            max_attempts_per_work_pack: u64::MAX,
            ..fast_config(0)
        };
        let miner = Miner::new(0, coordinator.clone(), config).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { miner.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        let report = handle.await.unwrap();
        assert_eq!(report.valid_blocks, 0);
        assert_eq!(coordinator.height().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_devices() {
        let coordinator = local(Buf32::filled(0xFF));
        let miners: Vec<Miner> = (0..2)
            .map(|d| Miner::new(d, coordinator.clone(), fast_config(2)).unwrap())
            .collect();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let reports = run_devices(&miners, shutdown_rx).await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.work_packs == 2));
        let blocks: u64 = reports.iter().map(|r| r.valid_blocks).sum();
        assert_eq!(coordinator.height().await, blocks);
        assert!(blocks >= 1);
    }
}
