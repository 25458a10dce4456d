//! Prometheus metrics backend for gasflood.
//!
//! Implements [`gasflood_metrics::MetricsRecorder`] with Prometheus counters
//! and gauges registered in a recorder-owned [`Registry`], so several
//! recorders (one per test, say) never collide.
//!
//! # Usage
//!
//! ```ignore
//! let recorder = Arc::new(PrometheusRecorder::new()?);
//! let (content_type, body) = recorder.encode()?;
//! ```

use gasflood_metrics::{MetricsRecorder, RefundOutcome, WorkerStateCounts};
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry,
    register_gauge_with_registry, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder,
};

/// Prometheus metrics for the worker pool.
pub struct Metrics {
    // === Transactions ===
    pub successful_tx: CounterVec,
    pub failed_tx: CounterVec,
    pub successful_tx_fee: GaugeVec,

    // === Funding ===
    pub refunds: CounterVec,
    pub funding_queue_depth: Gauge,
    pub orchestrator_balance: Gauge,

    // === Pool ===
    pub workers: GaugeVec,
}

impl Metrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            // Transactions
            successful_tx: register_counter_vec_with_registry!(
                "successful_tx_total",
                "Transactions mined successfully",
                &["worker"],
                registry
            )?,

            failed_tx: register_counter_vec_with_registry!(
                "failed_tx_total",
                "Transactions that failed, by classified reason",
                &["worker", "reason"],
                registry
            )?,

            successful_tx_fee: register_gauge_vec_with_registry!(
                "successful_tx_fee",
                "Fee in wei paid by the last successful transaction",
                &["worker"],
                registry
            )?,

            // Funding
            refunds: register_counter_vec_with_registry!(
                "refunds_total",
                "Refund attempts for workers that ran out of funds",
                &["worker", "outcome"],
                registry
            )?,

            funding_queue_depth: register_gauge_with_registry!(
                "funding_queue_depth",
                "Workers waiting for a refund",
                registry
            )?,

            orchestrator_balance: register_gauge_with_registry!(
                "orchestrator_balance",
                "Last observed funding account balance in wei",
                registry
            )?,

            // Pool
            workers: register_gauge_vec_with_registry!(
                "workers",
                "Workers by funding state",
                &["state"],
                registry
            )?,
        })
    }
}

/// Prometheus-backed metrics recorder.
pub struct PrometheusRecorder {
    registry: Registry,
    metrics: Metrics,
}

impl PrometheusRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let metrics = Metrics::new(&registry)?;
        Ok(Self { registry, metrics })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Gather and encode all metrics in the text exposition format.
    ///
    /// Returns `(content_type, encoded_body)` suitable for an HTTP response.
    pub fn encode(&self) -> Result<(String, Vec<u8>), prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let content_type = encoder.format_type().to_string();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok((content_type, buffer))
    }
}

impl MetricsRecorder for PrometheusRecorder {
    // ── Transactions ─────────────────────────────────────────────────

    fn record_tx_succeeded(&self, worker: &str, fee_wei: f64) {
        self.metrics
            .successful_tx
            .with_label_values(&[worker])
            .inc();
        self.metrics
            .successful_tx_fee
            .with_label_values(&[worker])
            .set(fee_wei);
    }

    fn record_tx_failed(&self, worker: &str, reason: &str) {
        self.metrics
            .failed_tx
            .with_label_values(&[worker, reason])
            .inc();
    }

    // ── Funding ──────────────────────────────────────────────────────

    fn record_refund(&self, worker: &str, outcome: RefundOutcome) {
        self.metrics
            .refunds
            .with_label_values(&[worker, outcome.as_str()])
            .inc();
    }

    fn set_funding_queue_depth(&self, depth: usize) {
        self.metrics.funding_queue_depth.set(depth as f64);
    }

    fn set_orchestrator_balance(&self, balance_wei: f64) {
        self.metrics.orchestrator_balance.set(balance_wei);
    }

    // ── Pool ─────────────────────────────────────────────────────────

    fn set_worker_states(&self, counts: WorkerStateCounts) {
        let workers = &self.metrics.workers;
        workers.with_label_values(&["active"]).set(counts.active as f64);
        workers
            .with_label_values(&["low_funds"])
            .set(counts.low_funds as f64);
        workers
            .with_label_values(&["stopped"])
            .set(counts.stopped as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(recorder: &PrometheusRecorder) -> String {
        let (content_type, body) = recorder.encode().unwrap();
        assert!(content_type.starts_with("text/plain"));
        String::from_utf8(body).unwrap()
    }

    #[test]
    fn test_transaction_metrics_exposition() {
        let recorder = PrometheusRecorder::new().unwrap();
        recorder.record_tx_succeeded("0xaa", 2_100_000.0);
        recorder.record_tx_succeeded("0xaa", 4_200_000.0);
        recorder.record_tx_failed("0xbb", "INVALID_NONCE");

        let text = encoded(&recorder);
        assert!(text.contains(r#"successful_tx_total{worker="0xaa"} 2"#));
        assert!(text.contains(r#"successful_tx_fee{worker="0xaa"} 4200000"#));
        assert!(text.contains(r#"failed_tx_total{reason="INVALID_NONCE",worker="0xbb"} 1"#));
    }

    #[test]
    fn test_funding_and_pool_metrics_exposition() {
        let recorder = PrometheusRecorder::new().unwrap();
        recorder.record_refund("0xaa", RefundOutcome::Funded);
        recorder.record_refund("0xaa", RefundOutcome::Failed);
        recorder.set_funding_queue_depth(2);
        recorder.set_orchestrator_balance(25.0);
        recorder.set_worker_states(WorkerStateCounts {
            active: 4,
            low_funds: 1,
            stopped: 0,
        });

        let text = encoded(&recorder);
        assert!(text.contains(r#"refunds_total{outcome="funded",worker="0xaa"} 1"#));
        assert!(text.contains(r#"refunds_total{outcome="failed",worker="0xaa"} 1"#));
        assert!(text.contains("funding_queue_depth 2"));
        assert!(text.contains("orchestrator_balance 25"));
        assert!(text.contains(r#"workers{state="active"} 4"#));
        assert!(text.contains(r#"workers{state="low_funds"} 1"#));
    }

    #[test]
    fn test_recorders_do_not_share_registries() {
        let first = PrometheusRecorder::new().unwrap();
        let second = PrometheusRecorder::new().unwrap();
        first.record_tx_failed("0xaa", "INSUFFICIENT_FUNDS");

        assert!(encoded(&first).contains("failed_tx_total"));
        assert!(!encoded(&second).contains(r#"reason="INSUFFICIENT_FUNDS""#));
    }
}
