//! # Sketchpad Server Library
//!
//! Synchronization authority for collaborative drawing rooms, plus the HTTP and
//! WebSocket surface around it. This library is used by both the binary and
//! integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod authority;
pub mod config;
pub mod health;
pub mod metrics;
pub mod presence;
pub mod protocol;
pub mod routes;
pub mod sync;
pub mod validation;

pub use authority::{AuthorityError, RoomSummary, SyncAuthority};
pub use config::{RateLimitConfig, ServerConfig};
pub use routes::app_router;

/// Shared application state.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Authority applying intents to room ledgers.
    pub authority: SyncAuthority,
    /// Rate limit applied to every WebSocket connection.
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    /// Create application state with the given rate limit.
    #[must_use]
    pub fn new(rate_limit: RateLimitConfig) -> Self {
        Self {
            authority: SyncAuthority::new(),
            rate_limit,
        }
    }

    /// Get a reference to the authority.
    #[must_use]
    pub fn authority(&self) -> &SyncAuthority {
        &self.authority
    }
}
