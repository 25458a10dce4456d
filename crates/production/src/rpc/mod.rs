//! HTTP server for a running load generator.
//!
//! # Health & Readiness
//!
//! - `GET /health` - Liveness probe (always returns 200 if server running)
//! - `GET /ready` - Readiness probe (200 once the orchestrator has initialized, 503 otherwise)
//!
//! # Metrics & Observability
//!
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /api/v1/status` - Pool status (workers by funding state, counters, contract)
//!
//! The server is started before the orchestrator initializes so that probes
//! answer while workers are still being funded:
//!
//! ```ignore
//! let state = RpcState::new(orchestrator.monitor(), recorder.clone());
//! let handle = RpcServer::new(RpcServerConfig::default(), state).start().await?;
//! orchestrator.initialize().await?;
//! ```

mod handlers;
mod routes;
mod server;
mod state;
mod types;

pub use routes::create_router;
pub use server::{RpcServer, RpcServerConfig, RpcServerError, RpcServerHandle};
pub use state::RpcState;
pub use types::*;
