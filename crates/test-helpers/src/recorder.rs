//! Metrics recorder that keeps every event for later assertions.

use gasflood_metrics::{MetricsRecorder, RefundOutcome, WorkerStateCounts};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    TxSucceeded { worker: String, fee_wei: f64 },
    TxFailed { worker: String, reason: String },
    Refund { worker: String, outcome: RefundOutcome },
    FundingQueueDepth(usize),
    OrchestratorBalance(f64),
    WorkerStates(WorkerStateCounts),
}

#[derive(Debug, Default)]
pub struct RecordingRecorder {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().clone()
    }

    pub fn successes(&self, worker: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, MetricEvent::TxSucceeded { worker: w, .. } if w == worker))
            .count()
    }

    pub fn failures(&self, worker: &str, reason: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| {
                matches!(e, MetricEvent::TxFailed { worker: w, reason: r } if w == worker && r == reason)
            })
            .count()
    }

    /// Failure reasons recorded for `worker`, in order.
    pub fn failure_reasons(&self, worker: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                MetricEvent::TxFailed { worker: w, reason } if w == worker => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn refunds(&self, worker: &str, outcome: RefundOutcome) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| {
                matches!(e, MetricEvent::Refund { worker: w, outcome: o } if w == worker && *o == outcome)
            })
            .count()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().push(event);
    }
}

impl MetricsRecorder for RecordingRecorder {
    fn record_tx_succeeded(&self, worker: &str, fee_wei: f64) {
        self.push(MetricEvent::TxSucceeded {
            worker: worker.to_string(),
            fee_wei,
        });
    }

    fn record_tx_failed(&self, worker: &str, reason: &str) {
        self.push(MetricEvent::TxFailed {
            worker: worker.to_string(),
            reason: reason.to_string(),
        });
    }

    fn record_refund(&self, worker: &str, outcome: RefundOutcome) {
        self.push(MetricEvent::Refund {
            worker: worker.to_string(),
            outcome,
        });
    }

    fn set_funding_queue_depth(&self, depth: usize) {
        self.push(MetricEvent::FundingQueueDepth(depth));
    }

    fn set_orchestrator_balance(&self, balance_wei: f64) {
        self.push(MetricEvent::OrchestratorBalance(balance_wei));
    }

    fn set_worker_states(&self, counts: WorkerStateCounts) {
        self.push(MetricEvent::WorkerStates(counts));
    }
}
