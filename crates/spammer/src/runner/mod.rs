//! Orchestrator: bootstraps the pool and owns every task of a run.

use crate::config::{ConfigError, OrchestratorConfig};
use crate::funding::{Funder, FundingError, FundingQueue, Refunder};
use crate::signer::Signer;
use crate::stats::{PoolMonitor, RunReport, RunStats};
use crate::worker::{Worker, WorkerContext, WorkerHandle};
use crate::workloads::{GasConsumerWorkload, WorkloadGenerator};
use alloy_primitives::{Address, U256};
use futures::future::join_all;
use gasflood_chain::{Account, ChainClient, ChainError, ContractArtifact};
use gasflood_metrics::SharedRecorder;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Errors that abort [`Orchestrator::initialize`].
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("orchestrator balance {balance} is below the minimum {minimum}")]
    Underfunded { balance: U256, minimum: U256 },

    #[error("failed to deploy gas consumer contract: {0}")]
    ContractDeployFailure(#[source] ChainError),

    #[error("failed to fund worker {address}: {source}")]
    WorkerFunding {
        address: Address,
        #[source]
        source: ChainError,
    },

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("orchestrator already initialized")]
    AlreadyInitialized,
}

impl From<FundingError> for OrchestratorError {
    fn from(err: FundingError) -> Self {
        match err {
            FundingError::Underfunded { balance, minimum } => Self::Underfunded { balance, minimum },
            FundingError::Chain(e) => Self::Chain(e),
        }
    }
}

/// Owns the funding account, the shared contract, the workers and the
/// refunder.
///
/// ```ignore
/// let orchestrator = Orchestrator::new(config, client, account, metrics)?
///     .with_contract_artifact(artifact);
/// orchestrator.initialize().await?;
/// // ... until a signal arrives
/// let report = orchestrator.shutdown().await;
/// ```
pub struct Orchestrator {
    config: OrchestratorConfig,
    client: Arc<dyn ChainClient>,
    funder: Arc<Funder>,
    artifact: Option<ContractArtifact>,
    workload: Arc<dyn WorkloadGenerator>,
    metrics: SharedRecorder,
    queue: Arc<FundingQueue<Arc<WorkerHandle>>>,
    stats: Arc<RunStats>,
    monitor: Arc<PoolMonitor>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    receipts: TaskTracker,
    started: AtomicBool,
    stopped: AtomicBool,
    start_time: Instant,
}

impl Orchestrator {
    /// Create an orchestrator funding workers from `account`.
    pub fn new(
        config: OrchestratorConfig,
        client: Arc<dyn ChainClient>,
        account: Account,
        metrics: SharedRecorder,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;

        let stats = Arc::new(RunStats::default());
        let queue = Arc::new(FundingQueue::new());
        let depth_queue = queue.clone();
        let monitor = Arc::new(PoolMonitor::new(stats.clone(), move || depth_queue.len()));
        let funder = Arc::new(Funder::new(
            Signer::new(account, client.clone()),
            config.funds_per_account,
            config.min_orchestrator_balance,
            config.wait_for_mining,
            metrics.clone(),
            stats.clone(),
        ));
        let workload = Arc::new(GasConsumerWorkload::new(config.gas_consume_per_tx));

        Ok(Self {
            config,
            client,
            funder,
            artifact: None,
            workload,
            metrics,
            queue,
            stats,
            monitor,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            receipts: TaskTracker::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            start_time: Instant::now(),
        })
    }

    /// Artifact to deploy when no contract address is configured.
    pub fn with_contract_artifact(mut self, artifact: ContractArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Replace the default gas consumer workload.
    pub fn with_workload(mut self, workload: Arc<dyn WorkloadGenerator>) -> Self {
        self.workload = workload;
        self
    }

    pub fn funder_address(&self) -> Address {
        self.funder.address()
    }

    /// Shared view of the pool, valid before initialization.
    pub fn monitor(&self) -> Arc<PoolMonitor> {
        self.monitor.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check funds, set up the contract, then start every worker, the
    /// refunder and the progress reporter.
    ///
    /// Returns once all workers are started. Any error is fatal for the run.
    pub async fn initialize(&self) -> Result<(), OrchestratorError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyInitialized);
        }
        info!(
            workers = self.config.number_of_accounts,
            funder = %self.funder.address(),
            workload = self.workload.name(),
            wait_for_mining = self.config.wait_for_mining,
            "Initializing orchestrator"
        );

        let contract = match self.start().await {
            Ok(contract) => contract,
            Err(e) => {
                // Workers started before the failure must not outlive it.
                self.stop();
                return Err(e);
            }
        };

        self.monitor.set_ready(true);
        info!(contract = %contract, "Orchestrator initialized");
        Ok(())
    }

    async fn start(&self) -> Result<Address, OrchestratorError> {
        self.funder.ensure_min_balance().await?;
        let contract = self.initialize_contract().await?;
        self.monitor.set_contract(contract);
        self.initialize_workers(contract).await?;
        self.initialize_refunder();
        self.spawn_progress_reporter();
        Ok(contract)
    }

    async fn initialize_contract(&self) -> Result<Address, OrchestratorError> {
        if let Some(contract) = self.config.contract_address {
            info!(contract = %contract, "Using existing gas consumer contract");
            return Ok(contract);
        }

        let artifact = self.artifact.as_ref().ok_or(ConfigError::MissingContract)?;
        info!("Deploying gas consumer contract");
        match self.funder.deploy(artifact).await {
            Ok(contract) => {
                info!(contract = %contract, "Gas consumer contract deployed");
                Ok(contract)
            }
            Err(e) => {
                error!(error = %e, "Failed to deploy gas consumer contract");
                Err(OrchestratorError::ContractDeployFailure(e))
            }
        }
    }

    async fn initialize_workers(&self, contract: Address) -> Result<(), OrchestratorError> {
        info!(count = self.config.number_of_accounts, "Initializing workers");

        let ctx = WorkerContext {
            contract,
            workload: self.workload.clone(),
            queue: self.queue.clone(),
            metrics: self.metrics.clone(),
            stats: self.stats.clone(),
            receipts: self.receipts.clone(),
            wait_for_mining: self.config.wait_for_mining,
            low_funds_poll_interval: self.config.low_funds_poll_interval,
        };

        for slot in 0..self.config.number_of_accounts {
            if self.cancel.is_cancelled() {
                warn!(started = slot, "Stopped while initializing workers");
                break;
            }

            let account = Account::random();
            let address = account.address();
            self.funder
                .fund(address, Some(true))
                .await
                .map_err(|e| match e {
                    FundingError::Chain(source) => {
                        OrchestratorError::WorkerFunding { address, source }
                    }
                    underfunded => underfunded.into(),
                })?;

            let worker = Worker::new(Signer::new(account, self.client.clone()), ctx.clone());
            self.monitor.add_worker(worker.handle());
            let task = tokio::spawn(worker.run(self.cancel.clone()));
            self.tasks.lock().push(task);
            info!(slot, worker = %address, "Worker funded and started");
        }
        Ok(())
    }

    fn initialize_refunder(&self) {
        let refunder = Refunder::new(
            self.queue.clone(),
            self.funder.clone(),
            self.metrics.clone(),
            self.stats.clone(),
            self.config.refund_idle_interval,
        );
        let task = tokio::spawn(refunder.run(self.cancel.clone()));
        self.tasks.lock().push(task);
    }

    fn spawn_progress_reporter(&self) {
        let monitor = self.monitor.clone();
        let metrics = self.metrics.clone();
        let cancel = self.cancel.clone();
        let interval = self.config.progress_interval;

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => report_progress(&monitor, &metrics),
                }
            }
        });
        self.tasks.lock().push(task);
    }

    /// Ask every worker and the refunder to halt. Idempotent, including
    /// after the cancellation token was cancelled directly.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.monitor.set_ready(false);
        for handle in self.monitor.workers() {
            handle.stop();
        }
        self.cancel.cancel();
        info!("Stopped the orchestrator");
    }

    /// Stop, wait for every task to finish and report on the run.
    pub async fn shutdown(&self) -> RunReport {
        self.stop();

        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for result in join_all(tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Task ended abnormally");
            }
        }
        self.receipts.close();
        self.receipts.wait().await;

        let abandoned = self.queue.drain();
        if !abandoned.is_empty() {
            info!(count = abandoned.len(), "Dropped pending refunds");
        }

        report_progress(&self.monitor, &self.metrics);
        RunReport {
            duration: self.start_time.elapsed(),
            workers: self.monitor.workers().len(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Log run statistics and refresh the pool gauges.
fn report_progress(monitor: &PoolMonitor, metrics: &SharedRecorder) {
    let status = monitor.status();
    metrics.set_worker_states(status.state_counts());
    metrics.set_funding_queue_depth(status.funding_queue_depth);

    info!(
        uptime_secs = status.uptime_secs,
        submitted = status.stats.submitted,
        succeeded = status.stats.succeeded,
        failed = status.stats.failed,
        refunds = status.stats.refunds,
        active = status.active,
        low_funds = status.low_funds,
        queued = status.funding_queue_depth,
        "Progress"
    );
}
