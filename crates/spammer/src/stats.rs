//! Run statistics, pool status and the final run report.

use crate::worker::{FundingState, WorkerHandle};
use alloy_primitives::Address;
use gasflood_metrics::WorkerStateCounts;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Process-local counters, shared by every task of a run.
#[derive(Debug, Default)]
pub struct RunStats {
    /// Contract calls handed to the chain client.
    pub submitted: AtomicU64,
    /// Transactions confirmed by a receipt.
    pub succeeded: AtomicU64,
    /// Rejected submissions and failed receipts, workers and funder alike.
    pub failed: AtomicU64,
    /// Refund transfers that went through.
    pub refunds: AtomicU64,
    /// Refund attempts that failed.
    pub refund_failures: AtomicU64,
}

impl RunStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            refunds: self.refunds.load(Ordering::Relaxed),
            refund_failures: self.refund_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub refunds: u64,
    pub refund_failures: u64,
}

/// Snapshot of the pool served on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub ready: bool,
    pub contract: Option<Address>,
    pub workers: usize,
    pub active: usize,
    pub low_funds: usize,
    pub stopped: usize,
    pub funding_queue_depth: usize,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
}

impl PoolStatus {
    pub fn state_counts(&self) -> WorkerStateCounts {
        WorkerStateCounts {
            active: self.active,
            low_funds: self.low_funds,
            stopped: self.stopped,
        }
    }
}

/// Read-only view of a running pool.
///
/// Created before initialization so that a status server can start first;
/// it reports `ready: false` and no workers until the orchestrator finishes
/// initializing.
pub struct PoolMonitor {
    workers: RwLock<Vec<Arc<WorkerHandle>>>,
    contract: OnceLock<Address>,
    queue_depth: Box<dyn Fn() -> usize + Send + Sync>,
    stats: Arc<RunStats>,
    ready: AtomicBool,
    started: Instant,
}

impl PoolMonitor {
    pub(crate) fn new(
        stats: Arc<RunStats>,
        queue_depth: impl Fn() -> usize + Send + Sync + 'static,
    ) -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
            contract: OnceLock::new(),
            queue_depth: Box::new(queue_depth),
            stats,
            ready: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    pub(crate) fn add_worker(&self, handle: Arc<WorkerHandle>) {
        self.workers.write().push(handle);
    }

    pub(crate) fn set_contract(&self, contract: Address) {
        let _ = self.contract.set(contract);
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn contract(&self) -> Option<Address> {
        self.contract.get().copied()
    }

    /// Handles of every started worker, in start order.
    pub fn workers(&self) -> Vec<Arc<WorkerHandle>> {
        self.workers.read().clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn status(&self) -> PoolStatus {
        let workers = self.workers.read();
        let mut counts = WorkerStateCounts::default();
        for handle in workers.iter() {
            match handle.state() {
                FundingState::Active => counts.active += 1,
                FundingState::LowFunds => counts.low_funds += 1,
                FundingState::Stopped => counts.stopped += 1,
            }
        }

        PoolStatus {
            ready: self.is_ready(),
            contract: self.contract(),
            workers: workers.len(),
            active: counts.active,
            low_funds: counts.low_funds,
            stopped: counts.stopped,
            funding_queue_depth: (self.queue_depth)(),
            uptime_secs: self.started.elapsed().as_secs(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Report generated after a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Total duration of the run.
    pub duration: Duration,
    /// Number of workers that were started.
    pub workers: usize,
    /// Counters at shutdown.
    pub stats: StatsSnapshot,
}

impl RunReport {
    /// Print the report to stdout.
    pub fn print(&self) {
        println!("\n=== Gasflood Report ===");
        println!("Duration: {:?}", self.duration);
        println!("Workers: {}", self.workers);
        println!("Submitted: {}", self.stats.submitted);
        println!("Succeeded: {}", self.stats.succeeded);
        println!("Failed: {}", self.stats.failed);
        println!("Refunds: {}", self.stats.refunds);
        println!("Refund failures: {}", self.stats.refund_failures);
    }
}
