//! # Sketchpad Core
//!
//! Authoritative state for collaborative drawing rooms.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               LedgerRegistry                │
//! │   room id ──► Arc<Mutex<RoomLedger>>        │
//! ├─────────────────────────────────────────────┤
//! │  RoomLedger                                 │
//! │  - operations   (replay order)              │
//! │  - undo stack   (global, LIFO)              │
//! │  - index        (id → position cache)       │
//! ├─────────────────────────────────────────────┤
//! │  Operation      (immutable stamped stroke)  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Nothing here performs I/O or awaits; every call completes synchronously.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod ledger;
pub mod operation;
pub mod registry;

pub use error::{LedgerError, LedgerResult};
pub use ledger::RoomLedger;
pub use operation::{Operation, OperationId, Point, Stroke, Tool};
pub use registry::{LedgerRegistry, SharedLedger};

/// Sketchpad core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
