//! Production wiring for the gasflood load generator.
//!
//! - [`config`]: TOML file, CLI flags and environment variables resolved into a [`BotConfig`]
//! - [`telemetry`]: `tracing` subscriber setup, optionally writing to a file
//! - [`rpc`]: the HTTP server exposing health, readiness, Prometheus metrics and pool status
//!
//! The `gasflood` binary ties these to an [`EvmClient`](gasflood_chain_evm::EvmClient)
//! and an [`Orchestrator`](gasflood_spammer::Orchestrator).

pub mod config;
pub mod rpc;
pub mod telemetry;

pub use config::{BotConfig, Cli, FileConfig};
pub use telemetry::init_logging;
