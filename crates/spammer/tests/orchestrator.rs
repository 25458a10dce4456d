//! End-to-end runs of the orchestrator against the in-memory chain.

use alloy_primitives::{Address, Bytes, U256};
use gasflood_chain::{Account, ChainClient, ChainError, ChainErrorCode, ContractArtifact};
use gasflood_metrics::{noop, RefundOutcome, ORCHESTRATOR_LABEL};
use gasflood_spammer::{
    FundingState, Orchestrator, OrchestratorConfig, OrchestratorError, ORCHESTRATOR_UNDERFUNDED,
};
use gasflood_test_helpers::{MockChain, RecordingRecorder};
use std::sync::Arc;
use std::time::Duration;

fn artifact() -> ContractArtifact {
    ContractArtifact {
        abi: serde_json::json!([]),
        bytecode: Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]),
    }
}

fn config(workers: usize, per_account: u64, minimum: u64) -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_accounts(workers)
        .with_funding(U256::from(per_account), U256::from(minimum))
        .with_poll_interval(Duration::from_millis(10))
}

struct Harness {
    chain: Arc<MockChain>,
    recorder: Arc<RecordingRecorder>,
    orchestrator: Orchestrator,
}

impl Harness {
    fn new(chain: MockChain, config: OrchestratorConfig, balance: u64) -> Self {
        let chain = Arc::new(chain);
        let recorder = Arc::new(RecordingRecorder::new());
        let account = Account::random();
        chain.set_balance(account.address(), U256::from(balance));
        let orchestrator = Orchestrator::new(config, chain.clone(), account, recorder.clone())
            .unwrap()
            .with_contract_artifact(artifact());
        Self {
            chain,
            recorder,
            orchestrator,
        }
    }

    fn funder_balance(&self) -> U256 {
        self.chain.balance_of(self.orchestrator.funder_address())
    }
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_initialize_funds_every_worker() {
    let h = Harness::new(MockChain::new(), config(5, 5, 10), 50);

    h.orchestrator.initialize().await.unwrap();

    assert_eq!(h.funder_balance(), U256::from(25));
    assert_eq!(h.chain.deployments().len(), 1);

    let monitor = h.orchestrator.monitor();
    let status = monitor.status();
    assert!(status.ready);
    assert_eq!(status.workers, 5);
    assert_eq!(status.contract, Some(h.chain.deployments()[0]));
    for handle in monitor.workers() {
        assert_eq!(h.chain.transfers_to(handle.address()).len(), 1);
    }

    wait_until(Duration::from_secs(5), || {
        monitor
            .workers()
            .iter()
            .all(|w| h.chain.invocations(w.address()) > 0)
    })
    .await;

    let report = h.orchestrator.shutdown().await;
    assert_eq!(report.workers, 5);
    assert!(report.stats.submitted > 0);
    assert!(!monitor.status().ready);
}

#[tokio::test]
async fn test_underfunded_orchestrator_is_fatal() {
    let h = Harness::new(MockChain::new(), config(5, 5, 10), 9);

    let err = h.orchestrator.initialize().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Underfunded { .. }));
    assert!(h.chain.deployments().is_empty());
    assert!(h.chain.transfers().is_empty());
    assert!(!h.orchestrator.monitor().is_ready());
}

#[tokio::test]
async fn test_deploy_failure_is_fatal() {
    let chain = MockChain::new();
    chain.fail_deployments(ChainError::new(
        ChainErrorCode::CallException,
        "contract creation code storage out of gas",
    ));
    let h = Harness::new(chain, config(3, 5, 10), 50);

    let err = h.orchestrator.initialize().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::ContractDeployFailure(_)));
    assert!(h.chain.transfers().is_empty());
}

#[tokio::test]
async fn test_initial_funding_failure_is_fatal() {
    let chain = MockChain::new();
    chain.fail_next_transfer(ChainError::new(ChainErrorCode::Network, "connection reset"));
    let h = Harness::new(chain, config(3, 5, 10), 50);

    let err = h.orchestrator.initialize().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::WorkerFunding { .. }));
    assert_eq!(
        h.recorder.failures(ORCHESTRATOR_LABEL, "NETWORK_ERROR"),
        1
    );
    assert_eq!(h.orchestrator.monitor().status().workers, 0);
}

#[tokio::test]
async fn test_existing_contract_is_reused() {
    let chain = Arc::new(MockChain::new());
    let deployer = Account::random();
    let contract = chain
        .deploy_contract(&deployer, 0, &artifact())
        .await
        .unwrap();

    let recorder = Arc::new(RecordingRecorder::new());
    let account = Account::random();
    chain.set_balance(account.address(), U256::from(50));
    let orchestrator = Orchestrator::new(
        config(2, 5, 10).with_contract_address(contract),
        chain.clone(),
        account,
        recorder,
    )
    .unwrap();

    orchestrator.initialize().await.unwrap();
    assert_eq!(chain.deployments(), vec![contract]);
    assert_eq!(orchestrator.monitor().contract(), Some(contract));

    wait_until(Duration::from_secs(5), || chain.total_invocations() > 0).await;
    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_missing_artifact_without_contract_address() {
    let chain = Arc::new(MockChain::new());
    let account = Account::random();
    chain.set_balance(account.address(), U256::from(50));
    let orchestrator = Orchestrator::new(
        config(1, 5, 10),
        chain,
        account,
        noop(),
    )
    .unwrap();

    let err = orchestrator.initialize().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Config(_)));
}

#[tokio::test]
async fn test_initialize_twice_is_rejected() {
    let h = Harness::new(MockChain::new(), config(1, 5, 10), 50);
    h.orchestrator.initialize().await.unwrap();

    let err = h.orchestrator.initialize().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::AlreadyInitialized));
    assert_eq!(h.chain.transfers().len(), 1);
    h.orchestrator.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_is_idempotent_and_final() {
    let h = Harness::new(MockChain::new(), config(3, 5, 10), 50);
    h.orchestrator.initialize().await.unwrap();
    wait_until(Duration::from_secs(5), || h.chain.total_invocations() > 10).await;

    h.orchestrator.stop();
    h.orchestrator.stop();
    let report = h.orchestrator.shutdown().await;

    let after_shutdown = h.chain.total_invocations();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.chain.total_invocations(), after_shutdown);
    assert_eq!(report.stats.submitted, after_shutdown);
    for handle in h.orchestrator.monitor().workers() {
        assert_eq!(handle.state(), FundingState::Stopped);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_low_funds_workers_are_refunded_until_threshold() {
    // Every call costs 1 wei and every allocation is 5 wei. Two workers take
    // 10 of the 100 wei; refunds continue while the funder holds at least 10,
    // i.e. at 90, 85, ..., 10: seventeen refunds, leaving 5.
    let chain = MockChain::new().with_call_cost(1, 1);
    let config = config(2, 5, 10).with_wait_for_mining(true);
    let h = Harness::new(chain, config, 100);

    h.orchestrator.initialize().await.unwrap();
    wait_until(Duration::from_secs(10), || {
        h.funder_balance() == U256::from(5)
            && h.chain.total_invocations() == 95
            && h.recorder.failures(ORCHESTRATOR_LABEL, ORCHESTRATOR_UNDERFUNDED) > 0
    })
    .await;

    let report = h.orchestrator.shutdown().await;
    assert_eq!(h.chain.transfers().len(), 19);
    assert_eq!(report.stats.refunds, 17);
    assert_eq!(report.stats.succeeded, 95);

    let monitor = h.orchestrator.monitor();
    assert_eq!(monitor.status().funding_queue_depth, 0);
    let funded: usize = monitor
        .workers()
        .iter()
        .map(|w| h.recorder.refunds(w.label(), RefundOutcome::Funded))
        .sum();
    assert_eq!(funded, 17);
    for handle in monitor.workers() {
        assert!(h.recorder.failures(handle.label(), "INSUFFICIENT_FUNDS") > 0);
        assert_eq!(h.chain.balance_of(handle.address()), U256::ZERO);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_detached_receipts_are_recorded_before_shutdown_returns() {
    let chain = MockChain::new()
        .with_call_cost(21_000, 1)
        .with_call_latency(Duration::from_millis(1));
    let h = Harness::new(chain, config(2, 1_000_000_000, 10), 10_000_000_000);
    h.orchestrator.initialize().await.unwrap();

    wait_until(Duration::from_secs(5), || h.chain.total_invocations() > 20).await;
    let report = h.orchestrator.shutdown().await;

    let mined = h.chain.total_invocations();
    assert_eq!(report.stats.submitted, mined);
    assert_eq!(report.stats.succeeded, mined);
    assert_eq!(report.stats.failed, 0);
    let recorded: usize = h
        .orchestrator
        .monitor()
        .workers()
        .iter()
        .map(|w| h.recorder.successes(w.label()))
        .sum();
    assert_eq!(recorded as u64, mined);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_external_cancel_still_clears_readiness() {
    let h = Harness::new(MockChain::new(), config(2, 5, 10), 50);
    h.orchestrator.initialize().await.unwrap();
    let monitor = h.orchestrator.monitor();
    assert!(monitor.is_ready());

    h.orchestrator.cancellation_token().cancel();
    h.orchestrator.shutdown().await;

    assert!(!monitor.is_ready());
    for handle in monitor.workers() {
        assert_eq!(handle.state(), FundingState::Stopped);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_external_nonce_change_is_recovered() {
    let h = Harness::new(MockChain::new(), config(1, 5, 10), 50);
    h.orchestrator.initialize().await.unwrap();

    let worker = h.orchestrator.monitor().workers()[0].clone();
    wait_until(Duration::from_secs(5), || h.chain.invocations(worker.address()) > 5).await;

    let jumped = h.chain.nonce_of(worker.address()) + 100;
    h.chain.set_nonce(worker.address(), jumped);
    wait_until(Duration::from_secs(5), || {
        h.chain.nonce_of(worker.address()) > jumped + 5
    })
    .await;

    h.orchestrator.shutdown().await;
    assert!(h.recorder.failures(worker.label(), "INVALID_NONCE") >= 1);
    assert_eq!(worker.state(), FundingState::Stopped);
}

#[test]
fn test_funder_address_matches_account() {
    let account = Account::random();
    let expected: Address = account.address();
    let orchestrator = Orchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(MockChain::new()),
        account,
        noop(),
    )
    .unwrap();
    assert_eq!(orchestrator.funder_address(), expected);
}
