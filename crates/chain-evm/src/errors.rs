use alloy::rpc::json_rpc::ErrorPayload;
use alloy::transports::{RpcError, TransportError};
use gasflood_chain::{ChainError, ChainErrorCode};

/// Map an alloy transport error onto a raw [`ChainError`].
///
/// JSON-RPC error responses keep the node's payload as the body so the
/// classifier can look at the message the node actually sent.
pub fn map_transport_error(err: TransportError) -> ChainError {
    match err {
        RpcError::ErrorResp(payload) => map_error_payload(&payload),
        RpcError::Transport(kind) => ChainError::new(ChainErrorCode::Network, kind.to_string()),
        RpcError::DeserError { err, text } => {
            ChainError::new(ChainErrorCode::Network, format!("bad response: {err}")).with_body(text)
        }
        other => ChainError::new(ChainErrorCode::Other("UNKNOWN_ERROR".to_string()), other.to_string()),
    }
}

fn map_error_payload(payload: &ErrorPayload) -> ChainError {
    let message = payload.message.to_string();
    if message.to_ascii_lowercase().contains("insufficient funds") {
        return ChainError::insufficient_funds(message);
    }
    let body = serde_json::json!({ "error": payload }).to_string();
    ChainError::server(message, body)
}
