//! Concurrent used-address recovery.
//!
//! The scanner walks the derivation index space in fixed-size batches. A
//! pool of workers derives each batch's addresses and asks the oracle which
//! are used; a single coordinator folds the results into a monotone
//! frontier and decides when the trailing gap of unused indices is large
//! enough to stop. Batches are dispatched in increasing order but may
//! complete out of order, so the fold must be order-independent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::address::UnlockConditions;
use crate::config::ScanConfig;
use crate::dictionary::Dictionary;
use crate::error::WalletError;
use crate::oracle::{AddressOracle, UsageType};
use crate::wallet::SeedWallet;

/// An address discovered (or synthesized) during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveredAddress {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<UsageType>,
    pub index: u64,
    pub unlock_conditions: UnlockConditions,
}

/// One partial result, emitted per completed batch.
#[derive(Debug, Clone, Serialize)]
pub struct ScanProgress {
    pub found: usize,
    pub addresses: Vec<RecoveredAddress>,
    pub index: u64,
}

/// The final result of a scan. `addresses` holds at most the synthesized
/// next receive address; everything else was already streamed as progress.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub addresses: Vec<RecoveredAddress>,
    pub index: u64,
    pub frontier: ScanFrontier,
}

/// High-water marks for scanned and used indices. The only mutable state
/// shared across scan rounds, updated exclusively by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanFrontier {
    pub last_scanned_index: u64,
    pub last_used_index: u64,
}

#[derive(Debug, Clone, Copy)]
struct BatchJob {
    start: u64,
    end: u64,
}

#[derive(Debug)]
struct BatchOutcome {
    end: u64,
    last_used_index: u64,
    last_used_type: Option<UsageType>,
    addresses: Vec<RecoveredAddress>,
}

/// Coordinator-side fold over batch outcomes. Commutative and idempotent:
/// absorbing the same set of outcomes in any order yields the same state.
#[derive(Debug, Default)]
struct FrontierState {
    frontier: ScanFrontier,
    last_used_type: Option<UsageType>,
}

impl FrontierState {
    fn absorb(&mut self, outcome: &BatchOutcome) {
        self.frontier.last_scanned_index = self.frontier.last_scanned_index.max(outcome.end);
        if let Some(usage) = outcome.last_used_type {
            // batches are disjoint, so >= only triggers when this outcome
            // holds the new highest used index (or re-delivers the current one)
            if self.last_used_type.is_none()
                || outcome.last_used_index >= self.frontier.last_used_index
            {
                self.frontier.last_used_index = self
                    .frontier
                    .last_used_index
                    .max(outcome.last_used_index);
                self.last_used_type = Some(usage);
            }
        }
    }

    /// True once the trailing run of unused indices exceeds the lookahead
    /// and everything up to the caller's prior watermark has been rechecked.
    fn gap_exceeded(&self, last_known_used_index: u64, lookahead: u64) -> bool {
        self.frontier.last_scanned_index >= last_known_used_index
            && self.frontier.last_scanned_index - self.frontier.last_used_index > lookahead
    }
}

pub struct RecoveryScanner {
    oracle: Arc<dyn AddressOracle>,
    config: ScanConfig,
}

impl RecoveryScanner {
    pub fn new(oracle: Arc<dyn AddressOracle>, config: ScanConfig) -> Self {
        RecoveryScanner { oracle, config }
    }

    /// Scans for every used address the wallet's seed controls, starting at
    /// `start_index`. Partial results are streamed through `progress` as
    /// batches complete; the summary carries the final frontier and, when
    /// the last used address spent an output, one fresh receive address.
    ///
    /// An oracle failure aborts the scan and propagates; progress already
    /// delivered stands.
    pub async fn recover(
        &self,
        wallet: &SeedWallet,
        start_index: u64,
        last_known_used_index: u64,
        progress: mpsc::UnboundedSender<ScanProgress>,
    ) -> Result<ScanSummary, WalletError> {
        let workers = self.config.workers.max(1);
        let batch_size = self.config.batch_size.max(1);
        let lookahead = self.config.lookahead;

        let (work_tx, work_rx) = mpsc::channel::<BatchJob>(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) =
            mpsc::channel::<Result<BatchOutcome, WalletError>>(workers);
        let done = Arc::new(AtomicBool::new(false));

        for _ in 0..workers {
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let oracle = Arc::clone(&self.oracle);
            let wallet = wallet.clone();
            tokio::spawn(async move {
                loop {
                    let job = { work_rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    match scan_batch(&wallet, oracle.as_ref(), job).await {
                        Ok(outcome) => {
                            if result_tx.send(Ok(outcome)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            // fatal for this worker; the coordinator stops
                            // dispatching once it sees the error
                            let _ = result_tx.send(Err(e)).await;
                            break;
                        }
                    }
                }
            });
        }
        drop(result_tx);
        // only the workers hold the queue receiver now; once every worker
        // exits the queue closes and the dispatcher's send fails instead of
        // blocking forever
        drop(work_rx);

        // dispatcher: strictly increasing batches until the done flag flips
        let dispatcher_done = Arc::clone(&done);
        let dispatcher = tokio::spawn(async move {
            let mut start = start_index;
            loop {
                if dispatcher_done.load(Ordering::SeqCst) {
                    break;
                }
                let end = start.saturating_add(batch_size);
                if work_tx.send(BatchJob { start, end }).await.is_err() {
                    break;
                }
                if end == u64::MAX {
                    break;
                }
                start = end;
            }
            // dropping work_tx closes the queue and winds down the workers
        });

        let mut state = FrontierState::default();
        let mut failure: Option<WalletError> = None;

        while let Some(result) = result_rx.recv().await {
            match result {
                Err(e) => {
                    done.store(true, Ordering::SeqCst);
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                Ok(outcome) => {
                    state.absorb(&outcome);
                    debug!(
                        "batch complete through {}, frontier {:?}",
                        outcome.end, state.frontier
                    );

                    if !done.load(Ordering::SeqCst)
                        && state.gap_exceeded(last_known_used_index, lookahead)
                    {
                        info!(
                            "found gap of {} addresses from {} to {} ({})",
                            state.frontier.last_scanned_index - state.frontier.last_used_index,
                            state.frontier.last_used_index,
                            state.frontier.last_scanned_index,
                            lookahead
                        );
                        done.store(true, Ordering::SeqCst);
                    }

                    // the caller may have stopped listening; that is not an
                    // error for the scan itself
                    let _ = progress.send(ScanProgress {
                        found: outcome.addresses.len(),
                        addresses: outcome.addresses,
                        index: state.frontier.last_used_index,
                    });
                }
            }
        }

        let _ = dispatcher.await;

        if let Some(e) = failure {
            return Err(e);
        }

        let mut addresses = Vec::new();
        let mut index = state.frontier.last_used_index;
        if let Some(next) = next_receive_address(wallet, index, state.last_used_type) {
            index = next.index;
            addresses.push(next);
        }

        Ok(ScanSummary {
            addresses,
            index,
            frontier: state.frontier,
        })
    }
}

/// Recovers the used addresses of a seed phrase in one call. Convenience
/// wrapper over [`RecoveryScanner::recover`] for hosts that start from the
/// phrase itself.
pub async fn recover_addresses(
    phrase: &str,
    dict: &Dictionary,
    oracle: Arc<dyn AddressOracle>,
    config: ScanConfig,
    start_index: u64,
    last_known_used_index: u64,
    progress: mpsc::UnboundedSender<ScanProgress>,
) -> Result<ScanSummary, WalletError> {
    let wallet = SeedWallet::from_phrase(phrase, dict)?;
    RecoveryScanner::new(oracle, config)
        .recover(&wallet, start_index, last_known_used_index, progress)
        .await
}

/// When the wallet last spent an output, surfaces a guaranteed-unused
/// receive address one index past the used frontier. No address is
/// synthesized at the top of the index space.
fn next_receive_address(
    wallet: &SeedWallet,
    last_used_index: u64,
    last_used_type: Option<UsageType>,
) -> Option<RecoveredAddress> {
    if last_used_type != Some(UsageType::Sent) {
        return None;
    }
    let index = last_used_index.checked_add(1)?;
    let key = wallet.key_at(index);
    Some(RecoveredAddress {
        address: key.address().to_string(),
        usage_type: None,
        index,
        unlock_conditions: key.unlock_conditions,
    })
}

/// Derives one batch of addresses and matches the oracle's usage report
/// back to derivation indices.
async fn scan_batch(
    wallet: &SeedWallet,
    oracle: &dyn AddressOracle,
    job: BatchJob,
) -> Result<BatchOutcome, WalletError> {
    let mut by_address: HashMap<String, (u64, UnlockConditions)> = HashMap::new();
    let mut queries = Vec::with_capacity((job.end - job.start) as usize);
    for index in job.start..job.end {
        let key = wallet.key_at(index);
        let address = key.address().to_string();
        by_address.insert(address.clone(), (index, key.unlock_conditions));
        queries.push(address);
    }

    let used = oracle.find_used(&queries).await?;

    let mut outcome = BatchOutcome {
        end: job.end,
        last_used_index: 0,
        last_used_type: None,
        addresses: Vec::new(),
    };
    for usage in used {
        let Some((index, unlock_conditions)) = by_address.get(&usage.address) else {
            continue;
        };
        if outcome.last_used_type.is_none() || *index >= outcome.last_used_index {
            outcome.last_used_index = *index;
            outcome.last_used_type = Some(usage.usage_type);
        }
        outcome.addresses.push(RecoveredAddress {
            address: usage.address,
            usage_type: Some(usage.usage_type),
            index: *index,
            unlock_conditions: unlock_conditions.clone(),
        });
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::Seed;
    use crate::oracle::AddressUsage;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::timeout;

    struct StubOracle {
        used: HashMap<String, UsageType>,
        calls: AtomicUsize,
    }

    impl StubOracle {
        fn empty() -> Self {
            StubOracle {
                used: HashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        /// Marks indices `0..count` of `wallet` as used; the highest index
        /// gets `last_type`, the rest alternate sent/received.
        fn with_used(wallet: &SeedWallet, count: u64, last_type: UsageType) -> Self {
            let mut used = HashMap::new();
            for i in 0..count {
                let usage = if i + 1 == count {
                    last_type
                } else if i % 2 == 0 {
                    UsageType::Received
                } else {
                    UsageType::Sent
                };
                used.insert(wallet.key_at(i).address().to_string(), usage);
            }
            StubOracle {
                used,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AddressOracle for StubOracle {
        async fn find_used(
            &self,
            addresses: &[String],
        ) -> Result<Vec<AddressUsage>, WalletError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(addresses
                .iter()
                .filter_map(|a| {
                    self.used.get(a).map(|t| AddressUsage {
                        address: a.clone(),
                        usage_type: *t,
                    })
                })
                .collect())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl AddressOracle for FailingOracle {
        async fn find_used(&self, _: &[String]) -> Result<Vec<AddressUsage>, WalletError> {
            Err(WalletError::Oracle("connection refused".to_string()))
        }
    }

    /// Answers like [`StubOracle`] for the first `healthy_calls` requests,
    /// then fails every request after that.
    struct FlakyOracle {
        inner: StubOracle,
        healthy_calls: usize,
    }

    #[async_trait]
    impl AddressOracle for FlakyOracle {
        async fn find_used(
            &self,
            addresses: &[String],
        ) -> Result<Vec<AddressUsage>, WalletError> {
            if self.inner.calls.load(Ordering::SeqCst) >= self.healthy_calls {
                return Err(WalletError::Oracle("gateway timeout".to_string()));
            }
            self.inner.find_used(addresses).await
        }
    }

    fn test_wallet() -> SeedWallet {
        SeedWallet::from_seed(Seed::from_bytes([9u8; 32]))
    }

    fn test_config(workers: usize, batch_size: u64, lookahead: u64) -> ScanConfig {
        ScanConfig {
            workers,
            batch_size,
            lookahead,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ScanProgress>) -> Vec<ScanProgress> {
        let mut events = Vec::new();
        while let Ok(p) = rx.try_recv() {
            events.push(p);
        }
        events
    }

    #[tokio::test]
    async fn fresh_wallet_terminates_with_no_addresses() {
        let wallet = test_wallet();
        let oracle = Arc::new(StubOracle::empty());
        let scanner = RecoveryScanner::new(oracle.clone(), test_config(2, 50, 120));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let summary = scanner.recover(&wallet, 0, 0, tx).await.unwrap();

        // nothing used and nothing spent, so no synthesized next address
        assert!(summary.addresses.is_empty());
        assert_eq!(summary.index, 0);
        assert_eq!(summary.frontier.last_used_index, 0);
        assert!(summary.frontier.last_scanned_index > 120);

        for event in drain(&mut rx) {
            assert_eq!(event.found, 0);
            assert!(event.addresses.is_empty());
        }

        // bounded work: reaching the stop threshold takes 3 batches; the
        // slack past that is 2 results buffered, 2 in the workers, 2 in the
        // work queue and 1 send that was already blocked when the flag
        // flipped and still completes
        let calls = oracle.calls.load(Ordering::SeqCst);
        assert!(calls >= 3, "only {} oracle calls", calls);
        assert!(calls <= 3 + 2 + 2 + 2 + 1, "{} oracle calls", calls);
    }

    #[tokio::test]
    async fn recovers_all_used_addresses() {
        let wallet = test_wallet();
        let oracle = Arc::new(StubOracle::with_used(&wallet, 7, UsageType::Received));
        let scanner = RecoveryScanner::new(oracle, test_config(3, 10, 40));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let summary = scanner.recover(&wallet, 0, 0, tx).await.unwrap();

        let events = drain(&mut rx);
        let found: usize = events.iter().map(|e| e.found).sum();
        assert_eq!(found, 7);
        let mut indices: Vec<u64> = events
            .iter()
            .flat_map(|e| e.addresses.iter().map(|a| a.index))
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5, 6]);

        // last usage was a receive, so no extra address is synthesized
        assert!(summary.addresses.is_empty());
        assert_eq!(summary.index, 6);
        assert_eq!(summary.frontier.last_used_index, 6);
    }

    #[tokio::test]
    async fn sent_last_synthesizes_next_receive_address() {
        let wallet = test_wallet();
        let oracle = Arc::new(StubOracle::with_used(&wallet, 5, UsageType::Sent));
        let scanner = RecoveryScanner::new(oracle, test_config(2, 10, 30));
        let (tx, _rx) = mpsc::unbounded_channel();

        let summary = scanner.recover(&wallet, 0, 0, tx).await.unwrap();

        assert_eq!(summary.index, 5);
        assert_eq!(summary.addresses.len(), 1);
        let next = &summary.addresses[0];
        assert_eq!(next.index, 5);
        assert_eq!(next.address, wallet.key_at(5).address().to_string());
        assert!(next.usage_type.is_none());
    }

    #[tokio::test]
    async fn rescans_down_to_prior_watermark() {
        let wallet = test_wallet();
        let oracle = Arc::new(StubOracle::empty());
        let scanner = RecoveryScanner::new(oracle, test_config(2, 100, 50));
        let (tx, _rx) = mpsc::unbounded_channel();

        // the caller previously saw usage up to 1000; the scan must cover
        // at least that far even though the gap condition is met earlier
        let summary = scanner.recover(&wallet, 0, 1000, tx).await.unwrap();
        assert!(summary.frontier.last_scanned_index >= 1000);
    }

    #[tokio::test]
    async fn oracle_failure_aborts_scan() {
        let wallet = test_wallet();
        let scanner = RecoveryScanner::new(Arc::new(FailingOracle), test_config(3, 25, 100));
        let (tx, _rx) = mpsc::unbounded_channel();

        // a failing oracle must surface the error promptly, even when every
        // worker dies before the dispatcher is done
        let err = timeout(Duration::from_secs(10), scanner.recover(&wallet, 0, 0, tx))
            .await
            .expect("scan must terminate on oracle failure")
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn progress_before_failure_is_retained() {
        let wallet = test_wallet();
        // first batch succeeds and reports usage, everything after fails
        let oracle = Arc::new(FlakyOracle {
            inner: StubOracle::with_used(&wallet, 4, UsageType::Received),
            healthy_calls: 1,
        });
        let scanner = RecoveryScanner::new(oracle, test_config(1, 10, 100));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = timeout(Duration::from_secs(10), scanner.recover(&wallet, 0, 0, tx))
            .await
            .expect("scan must terminate on oracle failure")
            .unwrap_err();
        assert!(err.to_string().contains("gateway timeout"));

        let events = drain(&mut rx);
        let found: usize = events.iter().map(|e| e.found).sum();
        assert_eq!(found, 4);
    }

    #[tokio::test]
    async fn scan_respects_start_index() {
        let wallet = test_wallet();
        let oracle = Arc::new(StubOracle::with_used(&wallet, 3, UsageType::Received));
        let scanner = RecoveryScanner::new(oracle, test_config(1, 10, 20));
        let (tx, mut rx) = mpsc::unbounded_channel();

        // indices 0..3 are used but the scan starts above them
        let summary = scanner.recover(&wallet, 100, 0, tx).await.unwrap();
        assert_eq!(summary.frontier.last_used_index, 0);
        for event in drain(&mut rx) {
            assert_eq!(event.found, 0);
        }
    }

    #[test]
    fn next_address_synthesis_respects_index_ceiling() {
        let wallet = test_wallet();

        let next = next_receive_address(&wallet, 4, Some(UsageType::Sent)).unwrap();
        assert_eq!(next.index, 5);
        assert_eq!(next.address, wallet.key_at(5).address().to_string());

        let next = next_receive_address(&wallet, u64::MAX - 1, Some(UsageType::Sent)).unwrap();
        assert_eq!(next.index, u64::MAX);

        // nothing past the last derivable index
        assert!(next_receive_address(&wallet, u64::MAX, Some(UsageType::Sent)).is_none());
        assert!(next_receive_address(&wallet, 4, Some(UsageType::Received)).is_none());
        assert!(next_receive_address(&wallet, 4, None).is_none());
    }

    fn outcome(
        end: u64,
        last_used_index: u64,
        last_used_type: Option<UsageType>,
    ) -> BatchOutcome {
        BatchOutcome {
            end,
            last_used_index,
            last_used_type,
            addresses: Vec::new(),
        }
    }

    #[test]
    fn frontier_fold_is_order_independent() {
        let outcomes = vec![
            outcome(500, 42, Some(UsageType::Received)),
            outcome(1000, 0, None),
            outcome(1500, 1203, Some(UsageType::Sent)),
            outcome(2000, 0, None),
            outcome(2500, 2400, Some(UsageType::Received)),
            outcome(3000, 0, None),
        ];

        let fold = |order: &[usize]| {
            let mut state = FrontierState::default();
            for &i in order {
                state.absorb(&outcomes[i]);
            }
            (state.frontier, state.last_used_type)
        };

        let expected = fold(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(expected.0.last_scanned_index, 3000);
        assert_eq!(expected.0.last_used_index, 2400);
        assert_eq!(expected.1, Some(UsageType::Received));

        let permutations: &[&[usize]] = &[
            &[5, 4, 3, 2, 1, 0],
            &[2, 0, 5, 3, 1, 4],
            &[4, 5, 0, 1, 2, 3],
            &[1, 3, 5, 0, 2, 4],
        ];
        for order in permutations {
            assert_eq!(fold(order), expected, "order {:?}", order);
        }
    }

    #[test]
    fn frontier_fold_tracks_usage_at_index_zero() {
        let mut state = FrontierState::default();
        state.absorb(&outcome(500, 0, Some(UsageType::Sent)));
        assert_eq!(state.frontier.last_used_index, 0);
        assert_eq!(state.last_used_type, Some(UsageType::Sent));
    }

    #[test]
    fn gap_condition_honours_watermark() {
        let mut state = FrontierState::default();
        state.absorb(&outcome(600, 0, None));
        // gap of 600 exceeds a lookahead of 500, but the caller knew about
        // usage at index 1000
        assert!(!state.gap_exceeded(1000, 500));
        state.absorb(&outcome(1200, 0, None));
        assert!(state.gap_exceeded(1000, 500));
    }
}
