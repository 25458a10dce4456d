//! Bot configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. CLI flags, each of which falls back to its environment variable
//!
//! Example TOML:
//!
//! ```toml
//! [chain]
//! rpc_url = "http://localhost:8545"
//! private_key = "0x..."
//!
//! [pool]
//! number_of_accounts = 10
//! funds_per_account = "1000000000000000000"
//! min_orchestrator_balance = "10000000000000000000"
//! gas_consume_per_tx = 100000
//! wait_for_mining = false
//!
//! [contract]
//! address = "0x..."
//! artifact = "./contracts/GasConsumer.json"
//!
//! [server]
//! port = 8080
//!
//! [logging]
//! level = "info"
//! file = "./logs/gasflood.log"
//! ```
//!
//! Wei amounts are strings because they overflow TOML integers; both decimal
//! and `0x`-prefixed hex are accepted.

use alloy_primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use clap::Parser;
use gasflood_spammer::OrchestratorConfig;
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Keeps an EVM network busy with gas-burning contract calls.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gasflood")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the target node
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Private key of the funding account
    #[arg(long, env = "ORCH_PRIV_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Number of worker accounts
    #[arg(long, env = "NUMBER_OF_ACCOUNTS")]
    pub number_of_accounts: Option<usize>,

    /// Wei sent to each worker on creation and on every refund
    #[arg(long, env = "FUNDS_PER_ACCOUNT_BASE")]
    pub funds_per_account: Option<U256>,

    /// Minimum funding account balance, in wei
    #[arg(long, env = "ORCH_MIN_FUNDS_BASE")]
    pub min_orchestrator_balance: Option<U256>,

    /// Gas each contract call burns
    #[arg(long, env = "GAS_CONSUME_PER_TX")]
    pub gas_consume_per_tx: Option<u64>,

    /// Wait for each transaction to be mined before sending the next
    #[arg(long, env = "WAIT_FOR_TX_MINE")]
    pub wait_for_mining: Option<bool>,

    /// Log level filter (RUST_LOG takes precedence)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Port of the metrics and status server
    #[arg(long, env = "SERVER_PORT")]
    pub server_port: Option<u16>,

    /// Reuse this gas consumer contract instead of deploying one
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract_address: Option<Address>,

    /// Compiled gas consumer contract (JSON with `abi` and `bytecode`)
    #[arg(long, env = "CONTRACT_ARTIFACT")]
    pub contract_artifact: Option<PathBuf>,

    /// Path to log file (redirects all logs to this file)
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

// ═══════════════════════════════════════════════════════════════════════════
// File configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Contents of the TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub pool: PoolSection,
    #[serde(default)]
    pub contract: ContractSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Node connection and funding key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSection {
    pub rpc_url: Option<String>,
    pub private_key: Option<String>,
}

/// Worker pool sizing and funding.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSection {
    #[serde(default = "default_number_of_accounts")]
    pub number_of_accounts: usize,

    #[serde(default = "default_funds_per_account")]
    pub funds_per_account: String,

    #[serde(default = "default_min_orchestrator_balance")]
    pub min_orchestrator_balance: String,

    #[serde(default = "default_gas_consume_per_tx")]
    pub gas_consume_per_tx: u64,

    #[serde(default)]
    pub wait_for_mining: bool,

    #[serde(default = "default_refund_idle_interval_ms")]
    pub refund_idle_interval_ms: u64,

    #[serde(default = "default_low_funds_poll_interval_ms")]
    pub low_funds_poll_interval_ms: u64,

    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            number_of_accounts: default_number_of_accounts(),
            funds_per_account: default_funds_per_account(),
            min_orchestrator_balance: default_min_orchestrator_balance(),
            gas_consume_per_tx: default_gas_consume_per_tx(),
            wait_for_mining: false,
            refund_idle_interval_ms: default_refund_idle_interval_ms(),
            low_funds_poll_interval_ms: default_low_funds_poll_interval_ms(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

fn default_number_of_accounts() -> usize {
    10
}

fn default_funds_per_account() -> String {
    "1000000000000000000".to_string()
}

fn default_min_orchestrator_balance() -> String {
    "10000000000000000000".to_string()
}

fn default_gas_consume_per_tx() -> u64 {
    100_000
}

fn default_refund_idle_interval_ms() -> u64 {
    1_000
}

fn default_low_funds_poll_interval_ms() -> u64 {
    1_000
}

fn default_progress_interval_ms() -> u64 {
    10_000
}

/// Which gas consumer contract to call.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSection {
    pub address: Option<Address>,

    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,
}

impl Default for ContractSection {
    fn default() -> Self {
        Self {
            address: None,
            artifact: default_artifact(),
        }
    }
}

fn default_artifact() -> PathBuf {
    PathBuf::from("./contracts/GasConsumer.json")
}

/// Metrics and status server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_server_port(),
        }
    }
}

fn default_server_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,

    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(ref rpc_url) = cli.rpc_url {
            self.chain.rpc_url = Some(rpc_url.clone());
        }
        if let Some(ref key) = cli.private_key {
            self.chain.private_key = Some(key.clone());
        }
        if let Some(count) = cli.number_of_accounts {
            self.pool.number_of_accounts = count;
        }
        if let Some(amount) = cli.funds_per_account {
            self.pool.funds_per_account = amount.to_string();
        }
        if let Some(amount) = cli.min_orchestrator_balance {
            self.pool.min_orchestrator_balance = amount.to_string();
        }
        if let Some(gas) = cli.gas_consume_per_tx {
            self.pool.gas_consume_per_tx = gas;
        }
        if let Some(wait) = cli.wait_for_mining {
            self.pool.wait_for_mining = wait;
        }
        if let Some(ref level) = cli.log_level {
            self.logging.level = level.clone();
        }
        if let Some(port) = cli.server_port {
            self.server.port = port;
        }
        if let Some(address) = cli.contract_address {
            self.contract.address = Some(address);
        }
        if let Some(ref artifact) = cli.contract_artifact {
            self.contract.artifact = artifact.clone();
        }
        if let Some(ref file) = cli.log_file {
            self.logging.file = Some(file.clone());
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Resolved configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub rpc_url: String,
    pub private_key: String,
    pub orchestrator: OrchestratorConfig,
    /// Deployed when `orchestrator.contract_address` is unset.
    pub contract_artifact: PathBuf,
    pub server_addr: SocketAddr,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl BotConfig {
    /// Resolve defaults, the optional config file and CLI/env overrides.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut file = match cli.config {
            Some(ref path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        file.apply_overrides(cli);
        Self::from_file_config(file)
    }

    pub fn from_file_config(file: FileConfig) -> Result<Self> {
        let Some(rpc_url) = file.chain.rpc_url.filter(|s| !s.trim().is_empty()) else {
            bail!("RPC endpoint is required (--rpc-url or RPC_URL)");
        };
        let Some(private_key) = file.chain.private_key.filter(|s| !s.trim().is_empty()) else {
            bail!("Funding account private key is required (--private-key or ORCH_PRIV_KEY)");
        };

        let pool = file.pool;
        let orchestrator = OrchestratorConfig {
            number_of_accounts: pool.number_of_accounts,
            funds_per_account: parse_wei(&pool.funds_per_account)
                .context("Invalid funds per account")?,
            min_orchestrator_balance: parse_wei(&pool.min_orchestrator_balance)
                .context("Invalid orchestrator minimum balance")?,
            gas_consume_per_tx: pool.gas_consume_per_tx,
            wait_for_mining: pool.wait_for_mining,
            contract_address: file.contract.address,
            refund_idle_interval: Duration::from_millis(pool.refund_idle_interval_ms),
            low_funds_poll_interval: Duration::from_millis(pool.low_funds_poll_interval_ms),
            progress_interval: Duration::from_millis(pool.progress_interval_ms),
        };
        orchestrator
            .validate()
            .context("Invalid orchestrator configuration")?;

        Ok(Self {
            rpc_url,
            private_key,
            orchestrator,
            contract_artifact: file.contract.artifact,
            server_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, file.server.port)),
            log_level: file.logging.level,
            log_file: file.logging.file,
        })
    }
}

fn parse_wei(value: &str) -> Result<U256> {
    U256::from_str(value.trim()).with_context(|| format!("not a wei amount: {value:?}"))
}
