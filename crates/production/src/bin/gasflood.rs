//! Gasflood load generator.
//!
//! Funds a pool of worker accounts and keeps them submitting gas-burning
//! contract calls until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Everything from the environment
//! RPC_URL=http://localhost:8545 ORCH_PRIV_KEY=0x... gasflood
//!
//! # Configuration file with overrides
//! gasflood --config gasflood.toml --number-of-accounts 50 --wait-for-mining true
//! ```
//!
//! See [`gasflood_production::config`] for every option.

use anyhow::{Context, Result};
use clap::Parser;
use gasflood_chain::{Account, ChainClient, ContractArtifact};
use gasflood_chain_evm::EvmClient;
use gasflood_metrics_prometheus::PrometheusRecorder;
use gasflood_production::rpc::{RpcServer, RpcServerConfig, RpcState};
use gasflood_production::{init_logging, BotConfig, Cli};
use gasflood_spammer::Orchestrator;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configuration first, so the log level and file come from it.
    let config = BotConfig::from_cli(&cli)?;
    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        rpc_url = %config.rpc_url,
        workers = config.orchestrator.number_of_accounts,
        funds_per_account = %config.orchestrator.funds_per_account,
        min_orchestrator_balance = %config.orchestrator.min_orchestrator_balance,
        gas_consume_per_tx = config.orchestrator.gas_consume_per_tx,
        wait_for_mining = config.orchestrator.wait_for_mining,
        "Gasflood starting"
    );

    if let Err(e) = run(config).await {
        error!("Gasflood failed: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(config: BotConfig) -> Result<()> {
    let account = Account::from_private_key(&config.private_key)
        .context("Failed to load the funding account")?;
    let client = EvmClient::connect(&config.rpc_url)
        .await
        .with_context(|| format!("Failed to connect to {}", config.rpc_url))?;
    info!(chain_id = client.chain_id(), funder = %account.address(), "Connected");
    let client: Arc<dyn ChainClient> = Arc::new(client);

    let recorder = Arc::new(PrometheusRecorder::new().context("Failed to register metrics")?);
    let mut orchestrator =
        Orchestrator::new(config.orchestrator.clone(), client, account, recorder.clone())?;
    if config.orchestrator.contract_address.is_none() {
        let artifact = ContractArtifact::load(&config.contract_artifact).with_context(|| {
            format!(
                "Failed to load contract artifact: {}",
                config.contract_artifact.display()
            )
        })?;
        orchestrator = orchestrator.with_contract_artifact(artifact);
    }

    let server = RpcServer::new(
        RpcServerConfig {
            listen_addr: config.server_addr,
        },
        RpcState::new(orchestrator.monitor(), recorder),
    );
    let server_handle = server
        .start()
        .await
        .context("Failed to start HTTP server")?;

    let orchestrator = Arc::new(orchestrator);
    let cancel = orchestrator.cancellation_token();
    let signals = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => orchestrator.stop(),
                _ = cancel.cancelled() => {}
            }
        })
    };

    if let Err(e) = orchestrator.initialize().await {
        server_handle.abort();
        signals.abort();
        return Err(e).context("Failed to initialize the orchestrator");
    }
    info!("Gasflood running, press Ctrl+C to stop");

    orchestrator.cancellation_token().cancelled().await;
    info!("Initiating graceful shutdown...");
    let report = orchestrator.shutdown().await;
    server_handle.abort();
    if let Err(e) = signals.await {
        warn!(error = %e, "Signal task ended abnormally");
    }

    report.print();
    info!("Gasflood shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
