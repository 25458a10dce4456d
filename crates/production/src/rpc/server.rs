//! HTTP server implementation.

use super::routes::create_router;
use super::state::RpcState;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Errors from the HTTP server.
#[derive(Debug, Error)]
pub enum RpcServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Handle for controlling a running server.
pub struct RpcServerHandle {
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl RpcServerHandle {
    /// Address the server actually bound, useful with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Abort the server.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Health, metrics and status server.
pub struct RpcServer {
    config: RpcServerConfig,
    state: RpcState,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, state: RpcState) -> Self {
        Self { config, state }
    }

    /// Start the server and return a handle for control.
    pub async fn start(self) -> Result<RpcServerHandle, RpcServerError> {
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "HTTP server listening");

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = ?e, "HTTP server error");
            }
        });

        Ok(RpcServerHandle { task, local_addr })
    }
}
