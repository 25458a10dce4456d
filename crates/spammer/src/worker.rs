//! Workers: one funded account, one transaction loop.

use crate::classify::{classify, ErrorKind};
use crate::funding::FundingQueue;
use crate::signer::Signer;
use crate::stats::RunStats;
use crate::workloads::WorkloadGenerator;
use alloy_primitives::Address;
use gasflood_chain::{ChainError, TxReceipt};
use gasflood_metrics::SharedRecorder;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Funding state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingState {
    /// Submitting transactions.
    Active,
    /// Out of funds, waiting for a refund.
    LowFunds,
    /// Halted. Terminal.
    Stopped,
}

/// The part of a worker other tasks may touch.
///
/// Only the funding state is shared: the worker sets `LowFunds`, the
/// refunder restores `Active` and the orchestrator sets `Stopped`.
pub struct WorkerHandle {
    address: Address,
    label: String,
    state: Mutex<FundingState>,
    wake: Notify,
}

impl WorkerHandle {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            label: address.to_string(),
            state: Mutex::new(FundingState::Active),
            wake: Notify::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Metrics label of this worker: its checksummed address.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> FundingState {
        *self.state.lock()
    }

    /// Active → LowFunds. Returns whether the transition happened; the caller
    /// that wins it is the one that enqueues the worker.
    pub(crate) fn mark_low_funds(&self) -> bool {
        let mut state = self.state.lock();
        if *state == FundingState::Active {
            *state = FundingState::LowFunds;
            true
        } else {
            false
        }
    }

    /// LowFunds → Active. No effect in any other state.
    pub fn notify_refunded(&self) -> bool {
        let mut state = self.state.lock();
        if *state != FundingState::LowFunds {
            return false;
        }
        *state = FundingState::Active;
        drop(state);
        self.wake.notify_one();
        true
    }

    /// Halt the worker before its next iteration.
    pub fn stop(&self) {
        *self.state.lock() = FundingState::Stopped;
        self.wake.notify_one();
    }

    async fn wait_for_refund(&self, timeout: Duration, cancel: &CancellationToken) {
        tokio::select! {
            _ = self.wake.notified() => {}
            _ = tokio::time::sleep(timeout) => {}
            _ = cancel.cancelled() => {}
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("address", &self.address)
            .field("state", &self.state())
            .finish()
    }
}

/// Records the outcome of a submitted transaction once its receipt lands.
#[derive(Clone)]
struct ReceiptObserver {
    label: String,
    metrics: SharedRecorder,
    stats: Arc<RunStats>,
}

impl ReceiptObserver {
    fn observe(&self, outcome: Result<TxReceipt, ChainError>) {
        match outcome {
            Ok(receipt) => {
                debug!(
                    worker = %self.label,
                    hash = %receipt.tx_hash,
                    block = receipt.block_number,
                    index = receipt.tx_index,
                    "Transaction mined"
                );
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .record_tx_succeeded(&self.label, receipt.fee() as f64);
            }
            Err(e) => {
                let kind = classify(&e);
                warn!(worker = %self.label, reason = %kind, error = %e, "Transaction not confirmed");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_tx_failed(&self.label, kind.label());
            }
        }
    }
}

/// Everything a worker shares with the rest of the pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub contract: Address,
    pub workload: Arc<dyn WorkloadGenerator>,
    pub queue: Arc<FundingQueue<Arc<WorkerHandle>>>,
    pub metrics: SharedRecorder,
    pub stats: Arc<RunStats>,
    pub receipts: TaskTracker,
    pub wait_for_mining: bool,
    pub low_funds_poll_interval: Duration,
}

/// A worker task: submits calls from its own account until stopped.
pub struct Worker {
    handle: Arc<WorkerHandle>,
    signer: Signer,
    ctx: WorkerContext,
    observer: ReceiptObserver,
}

impl Worker {
    pub fn new(signer: Signer, ctx: WorkerContext) -> Self {
        let handle = Arc::new(WorkerHandle::new(signer.address()));
        let observer = ReceiptObserver {
            label: handle.label().to_string(),
            metrics: ctx.metrics.clone(),
            stats: ctx.stats.clone(),
        };
        Self {
            handle,
            signer,
            ctx,
            observer,
        }
    }

    pub fn handle(&self) -> Arc<WorkerHandle> {
        self.handle.clone()
    }

    /// Run the transaction loop until the worker is stopped or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(worker = %self.handle.label(), "Worker started");

        loop {
            if cancel.is_cancelled() {
                self.handle.stop();
            }
            match self.handle.state() {
                FundingState::Stopped => break,
                FundingState::LowFunds => {
                    self.handle
                        .wait_for_refund(self.ctx.low_funds_poll_interval, &cancel)
                        .await;
                }
                FundingState::Active => self.tick(&cancel).await,
            }
            tokio::task::yield_now().await;
        }

        info!(worker = %self.handle.label(), "Worker stopped");
    }

    /// One submission attempt.
    async fn tick(&mut self, cancel: &CancellationToken) {
        let call = self.ctx.workload.next_call(self.ctx.contract);
        self.ctx.stats.submitted.fetch_add(1, Ordering::Relaxed);

        match self.signer.invoke(&call).await {
            Ok(pending) => {
                let client = self.signer.client().clone();
                if self.ctx.wait_for_mining {
                    let outcome = client.wait_for_receipt(&pending).await;
                    self.observer.observe(outcome);
                } else {
                    let observer = self.observer.clone();
                    let cancel = cancel.clone();
                    self.ctx.receipts.spawn(async move {
                        // A receipt that is already available wins over cancellation.
                        tokio::select! {
                            biased;
                            outcome = client.wait_for_receipt(&pending) => observer.observe(outcome),
                            _ = cancel.cancelled() => {}
                        }
                    });
                }
            }
            Err(e) => self.on_failed(e).await,
        }
    }

    async fn on_failed(&mut self, err: ChainError) {
        let kind = classify(&err);
        let label = self.handle.label();

        if kind == ErrorKind::InsufficientFunds {
            warn!(worker = %label, "Insufficient funds, requesting refund");
            if self.handle.mark_low_funds() {
                self.ctx.queue.push(self.handle.clone());
                self.ctx.metrics.set_funding_queue_depth(self.ctx.queue.len());
            }
        }

        error!(worker = %label, reason = %kind, error = %err, "Transaction failed");
        self.ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
        self.ctx.metrics.record_tx_failed(label, kind.label());

        if let Err(e) = self.signer.resync().await {
            warn!(worker = %label, error = %e, "Failed to resynchronize nonce");
        }
    }
}
