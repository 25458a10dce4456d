//! Shared state for RPC handlers.

use gasflood_metrics_prometheus::PrometheusRecorder;
use gasflood_spammer::PoolMonitor;
use std::sync::Arc;
use std::time::Instant;

/// Shared state for RPC handlers.
#[derive(Clone)]
pub struct RpcState {
    /// View of the worker pool; also the source of readiness.
    pub monitor: Arc<PoolMonitor>,
    /// Registry backing `/metrics`.
    pub metrics: Arc<PrometheusRecorder>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl RpcState {
    pub fn new(monitor: Arc<PoolMonitor>, metrics: Arc<PrometheusRecorder>) -> Self {
        Self {
            monitor,
            metrics,
            start_time: Instant::now(),
        }
    }
}
