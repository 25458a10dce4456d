//! Configuration for the worker pool.

use alloy_primitives::{Address, U256};
use std::time::Duration;

/// One ether, in wei.
const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("number of accounts must be at least 1")]
    NoWorkers,

    #[error("funds per account must be greater than zero")]
    ZeroFunding,

    #[error("gas to consume per transaction must be greater than zero")]
    ZeroGas,

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("no contract address configured and no contract artifact to deploy")]
    MissingContract,
}

/// Orchestrator and worker pool settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of worker accounts to create and keep busy.
    pub number_of_accounts: usize,

    /// Amount sent to a worker on creation and on every refund (wei).
    pub funds_per_account: U256,

    /// The funding account refuses to send anything below this balance (wei).
    pub min_orchestrator_balance: U256,

    /// Gas each `go(uint256)` call is asked to burn.
    pub gas_consume_per_tx: u64,

    /// Wait for every transaction to be mined before sending the next one.
    pub wait_for_mining: bool,

    /// Reuse an already deployed gas consumer instead of deploying one.
    pub contract_address: Option<Address>,

    /// How long the refunder sleeps when the queue is empty.
    pub refund_idle_interval: Duration,

    /// How long a worker waits for a refund before re-checking its state.
    pub low_funds_poll_interval: Duration,

    /// How often run statistics are logged.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            number_of_accounts: 10,
            funds_per_account: U256::from(ONE_ETHER),
            min_orchestrator_balance: U256::from(10 * ONE_ETHER),
            gas_consume_per_tx: 100_000,
            wait_for_mining: false,
            contract_address: None,
            refund_idle_interval: Duration::from_secs(1),
            low_funds_poll_interval: Duration::from_secs(1),
            progress_interval: Duration::from_secs(10),
        }
    }
}

impl OrchestratorConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.number_of_accounts == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.funds_per_account.is_zero() {
            return Err(ConfigError::ZeroFunding);
        }
        if self.gas_consume_per_tx == 0 {
            return Err(ConfigError::ZeroGas);
        }
        for (name, interval) in [
            ("refund idle interval", self.refund_idle_interval),
            ("low funds poll interval", self.low_funds_poll_interval),
            ("progress interval", self.progress_interval),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ZeroInterval(name));
            }
        }
        Ok(())
    }

    pub fn with_accounts(mut self, number_of_accounts: usize) -> Self {
        self.number_of_accounts = number_of_accounts;
        self
    }

    pub fn with_funding(mut self, funds_per_account: U256, min_orchestrator_balance: U256) -> Self {
        self.funds_per_account = funds_per_account;
        self.min_orchestrator_balance = min_orchestrator_balance;
        self
    }

    pub fn with_contract_address(mut self, contract: Address) -> Self {
        self.contract_address = Some(contract);
        self
    }

    pub fn with_wait_for_mining(mut self, wait: bool) -> Self {
        self.wait_for_mining = wait;
        self
    }

    /// Use the same interval for every timed wait. Handy in tests.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.refund_idle_interval = interval;
        self.low_funds_poll_interval = interval;
        self.progress_interval = interval;
        self
    }
}
