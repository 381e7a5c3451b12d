//! HTTP routes: WebSocket upgrade, health probes and read-only room inspection.

use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sketchpad_core::Operation;

use crate::authority::RoomSummary;
use crate::health;
use crate::sync::handle_sync_socket;
use crate::AppState;

/// Full history of one room.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    /// Room id.
    pub room_id: String,
    /// Operations in replay order.
    pub operations: Vec<Operation>,
}

/// Build the application router without transport layers or static files.
///
/// The binary adds CORS, tracing and the static fallback; tests use the bare
/// router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route("/ws", get(websocket_handler))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/{room_id}", get(get_room))
        .with_state(state)
}

/// WebSocket upgrade for room synchronization.
#[tracing::instrument(name = "websocket_connect", skip(ws, state))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_sync_socket(socket, state))
}

/// List every room with a ledger.
#[tracing::instrument(name = "list_rooms", skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.authority.room_summaries())
}

/// Get a room's history.
#[tracing::instrument(name = "get_room", skip(state))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetail>, StatusCode> {
    let operations = state
        .authority
        .room_snapshot(&room_id)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(RoomDetail {
        room_id,
        operations,
    }))
}
