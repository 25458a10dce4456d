//! Gasflood load engine.
//!
//! Funds a pool of ephemeral worker accounts from one orchestrator account and
//! keeps every worker submitting gas-consuming contract calls. Workers that
//! run out of funds queue themselves for a refund and pause; a single refunder
//! task tops them up without stopping the rest of the pool.
//!
//! # Modules
//!
//! - [`runner`]: Orchestrator (initialization, stop, shutdown)
//! - [`worker`]: Worker transaction loop and funding state
//! - [`funding`]: Funding account, refund queue and refunder
//! - [`classify`]: Classification of failed submissions
//! - [`signer`]: Account plus cached nonce
//! - [`workloads`]: Contract call generation (WorkloadGenerator trait)
//! - [`stats`]: Run counters, pool status and run report
//! - [`config`]: Configuration types

pub mod classify;
pub mod config;
pub mod funding;
pub mod runner;
pub mod signer;
pub mod stats;
pub mod worker;
pub mod workloads;

pub use classify::{classify, ErrorKind};
pub use config::{ConfigError, OrchestratorConfig};
pub use funding::{Funder, FundingError, FundingQueue, Refunder, ORCHESTRATOR_UNDERFUNDED};
pub use runner::{Orchestrator, OrchestratorError};
pub use signer::Signer;
pub use stats::{PoolMonitor, PoolStatus, RunReport, RunStats, StatsSnapshot};
pub use worker::{FundingState, Worker, WorkerContext, WorkerHandle};
pub use workloads::{GasConsumerWorkload, WorkloadGenerator};
