//! Metrics facade for gasflood.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific methods and
//! default no-op implementations. There is no global recorder: the
//! orchestrator owns an `Arc<dyn MetricsRecorder>` and hands a clone to every
//! task that records.
//!
//! # Usage
//!
//! ```ignore
//! let recorder: SharedRecorder = Arc::new(PrometheusRecorder::new()?);
//! recorder.record_tx_succeeded(&worker, fee_wei);
//! ```

use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════
// Labels
// ═══════════════════════════════════════════════════════════════════════

/// `worker` label used for transfers sent by the funding account.
pub const ORCHESTRATOR_LABEL: &str = "orchestrator";

/// Outcome of a refund attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefundOutcome {
    Funded,
    Failed,
}

impl RefundOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Funded => "funded",
            Self::Failed => "failed",
        }
    }
}

/// Number of workers in each funding state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStateCounts {
    pub active: usize,
    pub low_funds: usize,
    pub stopped: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so backends only need
/// to override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync + 'static {
    // ── Transactions ─────────────────────────────────────────────────

    /// Record a mined transaction and the fee it paid, in wei.
    fn record_tx_succeeded(&self, worker: &str, fee_wei: f64) {}

    /// Record a failed transaction with its classified reason label.
    fn record_tx_failed(&self, worker: &str, reason: &str) {}

    // ── Funding ──────────────────────────────────────────────────────

    /// Record a refund attempt for a worker.
    fn record_refund(&self, worker: &str, outcome: RefundOutcome) {}

    /// Set the number of workers waiting in the funding queue.
    fn set_funding_queue_depth(&self, depth: usize) {}

    /// Set the last observed funding account balance, in wei.
    fn set_orchestrator_balance(&self, balance_wei: f64) {}

    // ── Pool ─────────────────────────────────────────────────────────

    /// Set the number of workers per funding state.
    fn set_worker_states(&self, counts: WorkerStateCounts) {}
}

/// Shared handle to a recorder.
pub type SharedRecorder = Arc<dyn MetricsRecorder>;

/// Recorder that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}

/// A [`SharedRecorder`] backed by [`NoopRecorder`].
pub fn noop() -> SharedRecorder {
    Arc::new(NoopRecorder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_accepts_everything() {
        let recorder = noop();
        recorder.record_tx_succeeded("0xabc", 1.0);
        recorder.record_tx_failed("0xabc", "INSUFFICIENT_FUNDS");
        recorder.record_refund("0xabc", RefundOutcome::Funded);
        recorder.set_funding_queue_depth(3);
        recorder.set_orchestrator_balance(1e19);
        recorder.set_worker_states(WorkerStateCounts::default());
    }

    #[test]
    fn test_refund_outcome_labels() {
        assert_eq!(RefundOutcome::Funded.as_str(), "funded");
        assert_eq!(RefundOutcome::Failed.as_str(), "failed");
    }
}
