//! Classification of failed submissions.

use gasflood_chain::{ChainError, ChainErrorCode};
use std::fmt;

/// What went wrong with a submission, as far as the pool cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The sender cannot pay for the transaction. Triggers a refund.
    InsufficientFunds,
    /// The node rejected the nonce. The cached nonce is resynchronized.
    InvalidNonce,
    /// Any other JSON-RPC error response, with the node's message.
    ServerError(String),
    /// Everything else, with the client's raw code.
    Unknown(String),
}

impl ErrorKind {
    /// Metrics reason label.
    pub fn label(&self) -> &str {
        match self {
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::InvalidNonce => "INVALID_NONCE",
            Self::ServerError(message) => message,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a raw chain error.
pub fn classify(err: &ChainError) -> ErrorKind {
    match err.code {
        ChainErrorCode::InsufficientFunds => ErrorKind::InsufficientFunds,
        ChainErrorCode::ServerError => {
            let message = server_message(err);
            if message.to_ascii_lowercase().contains("nonce") {
                ErrorKind::InvalidNonce
            } else {
                ErrorKind::ServerError(message)
            }
        }
        ref code => ErrorKind::Unknown(code.as_str().to_string()),
    }
}

/// The `error.message` of the JSON-RPC response body, or the error's own
/// message when there is no usable body.
fn server_message(err: &ChainError) -> String {
    err.body
        .as_deref()
        .and_then(|body| serde_json::from_str::<serde_json::Value>(body).ok())
        .and_then(|body| {
            body.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| err.message.clone())
}
