//! Prometheus metrics for sketchpad-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.
//! Every helper is a no-op until a recorder is installed.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const WS_CONNECTIONS_ACTIVE: &str = "sketchpad_ws_connections_active";
const WS_MESSAGES_TOTAL: &str = "sketchpad_ws_messages_total";
const VALIDATION_FAILURES_TOTAL: &str = "sketchpad_validation_failures_total";
const RATE_LIMITED_TOTAL: &str = "sketchpad_rate_limited_total";
const LEDGER_OPERATIONS_TOTAL: &str = "sketchpad_ledger_operations_total";
const ROOMS_ACTIVE: &str = "sketchpad_rooms_active";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Increment active WebSocket connections.
pub fn inc_ws_connections() {
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement active WebSocket connections.
pub fn dec_ws_connections() {
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a WebSocket message.
///
/// # Arguments
///
/// * `direction` - "inbound" or "outbound"
/// * `msg_type` - Wire type of the message (e.g., "draw", "initial-state")
pub fn record_ws_message(direction: &str, msg_type: &str) {
    counter!(
        WS_MESSAGES_TOTAL,
        "direction" => direction.to_string(),
        "type" => msg_type.to_string()
    )
    .increment(1);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `reason` - Short rejection reason (room_id, points, tool, stroke_width, ...)
pub fn record_validation_failure(reason: &str) {
    counter!(
        VALIDATION_FAILURES_TOTAL,
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a rate-limited frame.
pub fn record_rate_limited(source: &str) {
    counter!(
        RATE_LIMITED_TOTAL,
        "source" => source.to_string()
    )
    .increment(1);
}

/// Record an intent that changed a room ledger (draw, undo, redo, clear).
pub fn record_ledger_operation(intent: &str) {
    counter!(
        LEDGER_OPERATIONS_TOTAL,
        "intent" => intent.to_string()
    )
    .increment(1);
}

/// Update the number of rooms with a ledger.
#[allow(clippy::cast_precision_loss)]
pub fn set_rooms(count: usize) {
    gauge!(ROOMS_ACTIVE).set(count as f64);
}
