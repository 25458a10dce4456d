//! HTTP request handlers.

use super::state::RpcState;
use super::types::*;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

// ═══════════════════════════════════════════════════════════════════════════
// Health & Readiness Handlers
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /health` - liveness probe.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Handler for `GET /ready` - readiness probe.
pub async fn ready_handler(State(state): State<RpcState>) -> impl IntoResponse {
    if state.monitor.is_ready() {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready".to_string(),
                ready: true,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not_ready".to_string(),
                ready: false,
            }),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Metrics Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /metrics` - Prometheus metrics.
pub async fn metrics_handler(State(state): State<RpcState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok((content_type, buffer)) => {
            ([(axum::http::header::CONTENT_TYPE, content_type)], buffer).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Status Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /api/v1/status` - pool status.
pub async fn status_handler(State(state): State<RpcState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: version().to_string(),
        server_uptime_secs: state.start_time.elapsed().as_secs(),
        pool: state.monitor.status(),
    })
}
