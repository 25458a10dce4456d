//! The refunder: sole consumer of the funding queue.

use super::{Funder, FundingQueue};
use crate::stats::RunStats;
use crate::worker::{FundingState, WorkerHandle};
use gasflood_metrics::{RefundOutcome, SharedRecorder};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drains the funding queue, one transfer at a time.
pub struct Refunder {
    queue: Arc<FundingQueue<Arc<WorkerHandle>>>,
    funder: Arc<Funder>,
    metrics: SharedRecorder,
    stats: Arc<RunStats>,
    idle_interval: Duration,
}

impl Refunder {
    pub fn new(
        queue: Arc<FundingQueue<Arc<WorkerHandle>>>,
        funder: Arc<Funder>,
        metrics: SharedRecorder,
        stats: Arc<RunStats>,
        idle_interval: Duration,
    ) -> Self {
        Self {
            queue,
            funder,
            metrics,
            stats,
            idle_interval,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        info!("Refunder started");

        while !cancel.is_cancelled() {
            if self.queue.is_empty() {
                self.queue.wait_for_item(self.idle_interval, &cancel).await;
                continue;
            }

            while let Some(handle) = self.queue.pop() {
                self.metrics.set_funding_queue_depth(self.queue.len());
                self.refund(&handle).await;
                if cancel.is_cancelled() {
                    break;
                }
            }
        }

        info!("Refunder stopped");
    }

    /// Fund one worker and let it resume.
    ///
    /// The worker resumes even when the transfer failed: its next submission
    /// fails again and puts it back in the queue.
    async fn refund(&self, handle: &WorkerHandle) {
        if handle.state() == FundingState::Stopped {
            debug!(worker = %handle.label(), "Skipping refund for stopped worker");
            return;
        }

        let funded = self.funder.fund_account(handle.address(), None).await;
        let outcome = if funded {
            self.stats.refunds.fetch_add(1, Ordering::Relaxed);
            RefundOutcome::Funded
        } else {
            self.stats.refund_failures.fetch_add(1, Ordering::Relaxed);
            warn!(worker = %handle.label(), "Refund failed, worker resumes unfunded");
            RefundOutcome::Failed
        };
        self.metrics.record_refund(handle.label(), outcome);
        handle.notify_refunded();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Signer;
    use alloy_primitives::{Address, U256};
    use gasflood_chain::Account;
    use gasflood_test_helpers::{MockChain, RecordingRecorder};
    use tracing_test::traced_test;

    struct Fixture {
        chain: Arc<MockChain>,
        recorder: Arc<RecordingRecorder>,
        queue: Arc<FundingQueue<Arc<WorkerHandle>>>,
        refunder: Refunder,
    }

    fn fixture(orchestrator_balance: u64) -> Fixture {
        let chain = Arc::new(MockChain::new());
        let recorder = Arc::new(RecordingRecorder::new());
        let stats = Arc::new(RunStats::default());
        let account = Account::random();
        chain.set_balance(account.address(), U256::from(orchestrator_balance));

        let funder = Arc::new(Funder::new(
            Signer::new(account, chain.clone()),
            U256::from(5),
            U256::from(10),
            false,
            recorder.clone(),
            stats.clone(),
        ));
        let queue = Arc::new(FundingQueue::new());
        let refunder = Refunder::new(
            queue.clone(),
            funder,
            recorder.clone(),
            stats,
            Duration::from_millis(10),
        );
        Fixture {
            chain,
            recorder,
            queue,
            refunder,
        }
    }

    fn low_worker(byte: u8) -> Arc<WorkerHandle> {
        let handle = Arc::new(WorkerHandle::new(Address::repeat_byte(byte)));
        assert!(handle.mark_low_funds());
        handle
    }

    #[tokio::test]
    async fn test_refunds_in_fifo_order() {
        let fx = fixture(100);
        let first = low_worker(1);
        let second = low_worker(2);
        fx.queue.push(first.clone());
        fx.queue.push(second.clone());

        let cancel = CancellationToken::new();
        let task = tokio::spawn(fx.refunder.run(cancel.clone()));
        while !fx.queue.is_empty() || second.state() != FundingState::Active {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        task.await.unwrap();

        let transfers = fx.chain.transfers();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].to, first.address());
        assert_eq!(transfers[1].to, second.address());
        assert_eq!(first.state(), FundingState::Active);
        assert_eq!(fx.recorder.refunds(first.label(), RefundOutcome::Funded), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_refund_still_resumes_worker() {
        // Already below the minimum: every refund is refused.
        let fx = fixture(9);
        let worker = low_worker(3);
        fx.queue.push(worker.clone());

        fx.refunder.refund(&fx.queue.pop().unwrap()).await;

        assert_eq!(worker.state(), FundingState::Active);
        assert!(fx.chain.transfers().is_empty());
        assert_eq!(fx.recorder.refunds(worker.label(), RefundOutcome::Failed), 1);
        assert!(logs_contain("ORCHESTRATOR_UNDERFUNDED"));
        assert!(logs_contain("Refund failed"));
    }

    #[tokio::test]
    async fn test_stopped_worker_is_skipped() {
        let fx = fixture(100);
        let worker = low_worker(4);
        worker.stop();

        fx.refunder.refund(&worker).await;
        assert!(fx.chain.transfers().is_empty());
        assert_eq!(worker.state(), FundingState::Stopped);
    }
}
