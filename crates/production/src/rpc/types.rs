//! Response bodies.

use gasflood_spammer::PoolStatus;
use serde::Serialize;

/// Version reported by the status endpoints.
pub fn version() -> &'static str {
    option_env!("GASFLOOD_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: version().to_string(),
        }
    }
}

/// Body of `GET /ready`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub ready: bool,
}

/// Body of `GET /api/v1/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub server_uptime_secs: u64,
    #[serde(flatten)]
    pub pool: PoolStatus,
}
