//! # WebSocket Room Synchronization
//!
//! One task per connection. Inbound frames are rate limited, size checked,
//! parsed into [`ClientMessage`]s and applied through the [`SyncAuthority`];
//! everything the authority enqueues for this connection is drained from its
//! outbox back into the socket. See [`crate::protocol`] for the message
//! shapes.
//!
//! Frames that are rate limited, oversized or unparseable are dropped without
//! a reply.

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::authority::{AuthorityError, SyncAuthority};
use crate::config::RateLimitConfig;
use crate::metrics::{
    dec_ws_connections, inc_ws_connections, record_rate_limited, record_validation_failure,
    record_ws_message,
};
use crate::presence::Outbox;
use crate::protocol::ClientMessage;
use crate::validation::{validate_message_size, validate_room_id};
use crate::AppState;

/// Token bucket rate limiter for WebSocket connections.
///
/// Allows burst traffic up to `capacity` tokens, refilling at `refill_rate` tokens per second.
#[derive(Debug)]
pub struct RateLimiter {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    ///
    /// * `burst_capacity` - Maximum number of tokens (burst limit)
    /// * `sustained_rate` - Tokens added per second (sustained rate)
    #[must_use]
    pub fn new(burst_capacity: u32, sustained_rate: u32) -> Self {
        Self {
            tokens: f64::from(burst_capacity),
            capacity: f64::from(burst_capacity),
            refill_rate: f64::from(sustained_rate),
            last_refill: Instant::now(),
        }
    }

    /// Create a rate limiter from configuration.
    #[must_use]
    pub fn from_config(config: RateLimitConfig) -> Self {
        Self::new(config.burst, config.sustained)
    }

    /// Try to consume one token. Returns true if allowed, false if rate limited.
    pub fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let new_tokens = elapsed.as_secs_f64() * self.refill_rate;
        self.tokens = (self.tokens + new_tokens).min(self.capacity);
        self.last_refill = now;
    }
}

/// Per-connection state: identity, current room and outbox.
#[derive(Debug)]
pub struct ClientConnection {
    user_id: String,
    room_id: Option<String>,
    authority: SyncAuthority,
    outbox: Outbox,
}

impl ClientConnection {
    /// Create a connection with a fresh user id.
    #[must_use]
    pub fn new(authority: SyncAuthority, outbox: Outbox) -> Self {
        Self::with_user_id(authority, Uuid::new_v4().to_string(), outbox)
    }

    /// Create a connection with a known user id.
    #[must_use]
    pub fn with_user_id(authority: SyncAuthority, user_id: String, outbox: Outbox) -> Self {
        Self {
            user_id,
            room_id: None,
            authority,
            outbox,
        }
    }

    /// The connection's user id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The room this connection has joined, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Apply one client message.
    ///
    /// Joining while already in a room leaves the previous room first.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::NotJoined`] for intents sent before a join,
    /// and the authority's error for rejected joins and draws. The caller drops
    /// the message either way.
    pub fn handle_message(&mut self, msg: ClientMessage) -> Result<(), AuthorityError> {
        match msg {
            ClientMessage::JoinRoom { room_id, username } => {
                if let Err(e) = validate_room_id(&room_id) {
                    record_validation_failure(e.kind());
                    return Err(AuthorityError::InvalidRoom(e));
                }
                self.leave();
                self.authority.join(
                    &room_id,
                    &self.user_id,
                    username.as_deref(),
                    self.outbox.clone(),
                )?;
                self.room_id = Some(room_id);
                Ok(())
            }
            ClientMessage::Draw(candidate) => {
                let room_id = self.room_id.as_deref().ok_or(AuthorityError::NotJoined)?;
                self.authority.draw(room_id, &self.user_id, &candidate)?;
                Ok(())
            }
            ClientMessage::CursorMove { x, y } => {
                let room_id = self.room_id.as_deref().ok_or(AuthorityError::NotJoined)?;
                self.authority.cursor_move(room_id, &self.user_id, x, y);
                Ok(())
            }
            ClientMessage::Undo => {
                let room_id = self.room_id.as_deref().ok_or(AuthorityError::NotJoined)?;
                self.authority.undo(room_id);
                Ok(())
            }
            ClientMessage::Redo => {
                let room_id = self.room_id.as_deref().ok_or(AuthorityError::NotJoined)?;
                self.authority.redo(room_id);
                Ok(())
            }
            ClientMessage::ClearCanvas => {
                let room_id = self.room_id.as_deref().ok_or(AuthorityError::NotJoined)?;
                self.authority.clear(room_id);
                Ok(())
            }
        }
    }

    /// Leave the current room, if any.
    pub fn leave(&mut self) {
        if let Some(room_id) = self.room_id.take() {
            self.authority.leave(&room_id, &self.user_id);
        }
    }
}

/// Handle a WebSocket connection for room synchronization.
pub async fn handle_sync_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel();
    let mut client = ClientConnection::new(state.authority.clone(), outbox);
    let mut rate_limiter = RateLimiter::from_config(state.rate_limit);

    inc_ws_connections();
    tracing::info!(user_id = %client.user_id(), "Client connected");

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !rate_limiter.try_consume() {
                            tracing::warn!(user_id = %client.user_id(), "Rate limit exceeded, frame dropped");
                            record_rate_limited("websocket");
                            continue;
                        }

                        if let Err(e) = validate_message_size(text.len()) {
                            tracing::warn!(user_id = %client.user_id(), "Frame rejected: {}", e);
                            record_validation_failure(e.kind());
                            continue;
                        }

                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                let kind = client_msg.kind();
                                record_ws_message("inbound", kind);
                                if let Err(e) = client.handle_message(client_msg) {
                                    tracing::debug!(
                                        user_id = %client.user_id(),
                                        intent = kind,
                                        "Intent dropped: {}",
                                        e
                                    );
                                }
                            }
                            Err(e) => {
                                tracing::debug!(user_id = %client.user_id(), "Unparseable frame dropped: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(user_id = %client.user_id(), "Client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(user_id = %client.user_id(), "WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }

            outgoing = outbox_rx.recv() => {
                let Some(message) = outgoing else {
                    break;
                };
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        record_ws_message("outbound", message.kind());
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(user_id = %client.user_id(), "Failed to serialize {}: {}", message.kind(), e);
                    }
                }
            }
        }
    }

    client.leave();
    dec_ws_connections();
}
