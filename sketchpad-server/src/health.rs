//! Health check endpoints for Kubernetes probes.
//!
//! Provides liveness and readiness probes for container orchestration:
//! - `/health/live` - Liveness probe (restart if fails)
//! - `/health/ready` - Readiness probe (remove from LB if fails)
//! - `/health` - Combined check for backward compatibility

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy" or "unhealthy"
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
    /// Individual component checks
    pub checks: HealthChecks,
    /// Rooms with a ledger
    pub rooms: usize,
}

/// Individual health checks.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Ledger registry accessible
    pub ledger_registry: bool,
    /// WebSocket handler ready
    pub websocket: bool,
}

/// Liveness probe - is the server running?
#[tracing::instrument(name = "liveness_probe")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe - is the server ready to accept traffic?
#[tracing::instrument(name = "readiness_probe", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let ledgers = state.authority.ledgers();
    let registry_ok = ledgers.is_accessible();
    let rooms = if registry_ok { ledgers.len() } else { 0 };

    let (code, status) = readiness_status(registry_ok, true, rooms);
    if !registry_ok {
        tracing::warn!("Ledger registry is locked; reporting not ready");
    }
    (code, Json(status))
}

/// Combine component checks into a probe response.
fn readiness_status(registry_ok: bool, ws_ok: bool, rooms: usize) -> (StatusCode, HealthStatus) {
    let all_ok = registry_ok && ws_ok;

    let status = HealthStatus {
        status: if all_ok { "healthy" } else { "unhealthy" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            ledger_registry: registry_ok,
            websocket: ws_ok,
        },
        rooms,
    };

    let code = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, status)
}
