//! Error types for ledger operations.

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur when addressing room ledgers.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No ledger has been created for the room.
    #[error("Room not found: {0}")]
    RoomNotFound(String),
}
