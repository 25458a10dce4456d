//! Funding: the orchestrator account, the refund queue and the refunder.

mod queue;
mod refunder;

pub use queue::FundingQueue;
pub use refunder::Refunder;

use crate::classify::classify;
use crate::signer::Signer;
use crate::stats::RunStats;
use alloy_primitives::{Address, U256};
use gasflood_chain::{ChainClient, ChainError, ContractArtifact};
use gasflood_metrics::{SharedRecorder, ORCHESTRATOR_LABEL};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Reason label for a transfer refused by the balance threshold.
pub const ORCHESTRATOR_UNDERFUNDED: &str = "ORCHESTRATOR_UNDERFUNDED";

/// Approximate a wei amount for a gauge.
pub(crate) fn wei_to_f64(value: U256) -> f64 {
    u128::try_from(value).map_or(f64::MAX, |v| v as f64)
}

/// Why a funding transfer did not happen.
#[derive(Debug, thiserror::Error)]
pub enum FundingError {
    #[error("orchestrator balance {balance} is below the minimum {minimum}")]
    Underfunded { balance: U256, minimum: U256 },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl FundingError {
    /// Metrics reason label.
    pub fn label(&self) -> String {
        match self {
            Self::Underfunded { .. } => ORCHESTRATOR_UNDERFUNDED.to_string(),
            Self::Chain(e) => classify(e).label().to_string(),
        }
    }
}

/// The orchestrator account.
///
/// Every transfer goes through one async mutex held across the threshold
/// check, the send and the optional receipt wait, so orchestrator transfers
/// are totally ordered and never race on the nonce.
pub struct Funder {
    signer: Mutex<Signer>,
    address: Address,
    client: Arc<dyn ChainClient>,
    funds_per_account: U256,
    min_balance: U256,
    wait_for_mining: bool,
    metrics: SharedRecorder,
    stats: Arc<RunStats>,
}

impl Funder {
    pub fn new(
        signer: Signer,
        funds_per_account: U256,
        min_balance: U256,
        wait_for_mining: bool,
        metrics: SharedRecorder,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            address: signer.address(),
            client: signer.client().clone(),
            signer: Mutex::new(signer),
            funds_per_account,
            min_balance,
            wait_for_mining,
            metrics,
            stats,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Current balance, failing when it is below the minimum.
    pub async fn ensure_min_balance(&self) -> Result<U256, FundingError> {
        let balance = self.client.balance(self.address).await?;
        self.metrics.set_orchestrator_balance(wei_to_f64(balance));
        info!(balance = %balance, "Orchestrator balance");

        if balance < self.min_balance {
            return Err(FundingError::Underfunded {
                balance,
                minimum: self.min_balance,
            });
        }
        Ok(balance)
    }

    /// Send the per-account allocation to `to`.
    ///
    /// `wait_for_mining` overrides the configured default. Failures are
    /// logged, counted and followed by a nonce resync before being returned.
    pub async fn fund(&self, to: Address, wait_for_mining: Option<bool>) -> Result<(), FundingError> {
        let wait = wait_for_mining.unwrap_or(self.wait_for_mining);
        info!(to = %to, amount = %self.funds_per_account, "Funding account");

        let mut signer = self.signer.lock().await;
        let result = self.transfer_locked(&mut signer, to, wait).await;

        if let Err(e) = &result {
            let reason = e.label();
            error!(to = %to, reason = %reason, error = %e, "Funding transfer failed");
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_tx_failed(ORCHESTRATOR_LABEL, &reason);
            if let Err(resync) = signer.resync().await {
                error!(error = %resync, "Failed to resynchronize orchestrator nonce");
            }
        }
        result
    }

    /// [`fund`](Self::fund), reduced to whether it worked.
    pub async fn fund_account(&self, to: Address, wait_for_mining: Option<bool>) -> bool {
        self.fund(to, wait_for_mining).await.is_ok()
    }

    async fn transfer_locked(
        &self,
        signer: &mut Signer,
        to: Address,
        wait: bool,
    ) -> Result<(), FundingError> {
        self.ensure_min_balance().await?;
        let pending = signer.transfer(to, self.funds_per_account).await?;
        if wait {
            self.client.wait_for_receipt(&pending).await?;
        }
        Ok(())
    }

    /// Deploy a contract from the orchestrator account.
    pub async fn deploy(&self, artifact: &ContractArtifact) -> Result<Address, ChainError> {
        let mut signer = self.signer.lock().await;
        let result = signer.deploy(artifact).await;
        if result.is_err() {
            if let Err(resync) = signer.resync().await {
                error!(error = %resync, "Failed to resynchronize orchestrator nonce");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasflood_chain::{Account, ChainErrorCode};
    use gasflood_test_helpers::{MockChain, RecordingRecorder};
    use tracing_test::traced_test;

    struct Fixture {
        chain: Arc<MockChain>,
        recorder: Arc<RecordingRecorder>,
        funder: Funder,
    }

    fn fixture(balance: u64, per_account: u64, minimum: u64) -> Fixture {
        let chain = Arc::new(MockChain::new());
        let recorder = Arc::new(RecordingRecorder::new());
        let account = Account::random();
        chain.set_balance(account.address(), U256::from(balance));
        let funder = Funder::new(
            Signer::new(account, chain.clone()),
            U256::from(per_account),
            U256::from(minimum),
            false,
            recorder.clone(),
            Arc::new(RunStats::default()),
        );
        Fixture {
            chain,
            recorder,
            funder,
        }
    }

    #[tokio::test]
    async fn test_fund_transfers_allocation() {
        let fx = fixture(50, 5, 10);
        let worker = Address::repeat_byte(7);

        assert!(fx.funder.fund_account(worker, Some(true)).await);
        assert_eq!(fx.chain.balance_of(worker), U256::from(5));
        assert_eq!(fx.chain.balance_of(fx.funder.address()), U256::from(45));
    }

    #[tokio::test]
    async fn test_threshold_checked_before_every_transfer() {
        // 12 → 7 after one transfer, which is below the minimum of 10.
        let fx = fixture(12, 5, 10);
        let worker = Address::repeat_byte(7);

        assert!(fx.funder.fund_account(worker, None).await);
        assert!(!fx.funder.fund_account(worker, None).await);

        assert_eq!(fx.chain.transfers_to(worker).len(), 1);
        assert_eq!(fx.chain.balance_queries(fx.funder.address()), 2);
        assert_eq!(
            fx.recorder
                .failures(ORCHESTRATOR_LABEL, ORCHESTRATOR_UNDERFUNDED),
            1
        );
    }

    #[tokio::test]
    async fn test_failed_transfer_resyncs_nonce() {
        let fx = fixture(50, 5, 10);
        fx.chain.fail_next_transfer(ChainError::server(
            "processing response error",
            r#"{"error":{"message":"nonce too low"}}"#,
        ));

        let err = fx
            .funder
            .fund(Address::repeat_byte(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FundingError::Chain(ref e) if e.code == ChainErrorCode::ServerError));
        assert_eq!(fx.recorder.failures(ORCHESTRATOR_LABEL, "INVALID_NONCE"), 1);

        fx.chain.set_nonce(fx.funder.address(), 3);
        // The failed attempt resynced to 0; the chain moved on since, so the
        // next transfer fails once more and resyncs to 3.
        assert!(!fx.funder.fund_account(Address::repeat_byte(1), None).await);
        assert!(fx.funder.fund_account(Address::repeat_byte(1), None).await);
        assert_eq!(fx.chain.nonce_of(fx.funder.address()), 4);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failed_deploy_logs_failed_resync() {
        let fx = fixture(50, 5, 10);
        assert!(fx.funder.fund_account(Address::repeat_byte(1), None).await);

        fx.chain.fail_deployments(ChainError::new(
            ChainErrorCode::ServerError,
            "execution reverted",
        ));
        fx.chain.fail_nonce_queries(ChainError::new(
            ChainErrorCode::Network,
            "connection refused",
        ));
        let artifact =
            ContractArtifact::from_json(r#"{"abi": [], "bytecode": "0x6080604052"}"#).unwrap();

        let err = fx.funder.deploy(&artifact).await.unwrap_err();
        assert_eq!(err.code, ChainErrorCode::ServerError);
        assert!(logs_contain("Failed to resynchronize orchestrator nonce"));
        assert!(logs_contain("connection refused"));
    }

    #[tokio::test]
    async fn test_concurrent_funding_is_serialized() {
        let fx = Arc::new(fixture(1_000, 1, 10));
        let mut tasks = Vec::new();
        for i in 0..20u8 {
            let fx = fx.clone();
            tasks.push(tokio::spawn(async move {
                fx.funder.fund_account(Address::repeat_byte(i), None).await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(fx.chain.nonce_of(fx.funder.address()), 20);
        assert_eq!(fx.chain.balance_of(fx.funder.address()), U256::from(980));
    }
}
