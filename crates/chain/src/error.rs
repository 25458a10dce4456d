//! Raw chain errors.
//!
//! A [`ChainError`] is what a client reports before any interpretation. The
//! load engine classifies it later; clients only decide the coarse
//! [`ChainErrorCode`] and keep the provider's response body when there is one.

use std::fmt;

/// Coarse error code reported by a chain client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChainErrorCode {
    /// The sender cannot cover value plus fees.
    InsufficientFunds,
    /// The node answered with a JSON-RPC error response.
    ServerError,
    /// A mined transaction reverted.
    CallException,
    /// Waiting for a receipt timed out.
    Timeout,
    /// The request never got an answer (connection, HTTP, decoding).
    Network,
    /// The caller supplied something unusable (bad URL, empty bytecode).
    InvalidArgument,
    /// Local transaction signing failed.
    Signing,
    /// Anything a client could not map to one of the above.
    Other(String),
}

impl ChainErrorCode {
    /// Stable upper-case code string, used as a metrics label.
    pub fn as_str(&self) -> &str {
        match self {
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::ServerError => "SERVER_ERROR",
            Self::CallException => "CALL_EXCEPTION",
            Self::Timeout => "TIMEOUT",
            Self::Network => "NETWORK_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Signing => "SIGNING_ERROR",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ChainErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by a [`ChainClient`](crate::ChainClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ChainError {
    pub code: ChainErrorCode,
    pub message: String,
    /// Raw provider response body, when the node sent one.
    pub body: Option<String>,
}

impl ChainError {
    pub fn new(code: ChainErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            body: None,
        }
    }

    pub fn insufficient_funds(message: impl Into<String>) -> Self {
        Self::new(ChainErrorCode::InsufficientFunds, message)
    }

    /// A JSON-RPC error response; `body` is the response as the node sent it.
    pub fn server(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            code: ChainErrorCode::ServerError,
            message: message.into(),
            body: Some(body.into()),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}
