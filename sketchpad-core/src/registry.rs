//! Shared registry of room ledgers.
//!
//! Provides a thread-safe [`LedgerRegistry`] that maps room ids to their
//! [`RoomLedger`]. Ledgers are created lazily on first reference and live until
//! they are explicitly removed; a room emptying of participants does not drop
//! its history.
//!
//! Each ledger sits behind its own mutex, so intents for one room are applied
//! one at a time while different rooms proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::RoomLedger;
use crate::operation::Operation;

/// Handle to one room's ledger.
pub type SharedLedger = Arc<Mutex<RoomLedger>>;

/// Thread-safe map of room id to ledger.
///
/// # Example
///
/// ```
/// use sketchpad_core::{LedgerRegistry, Operation, Point, Stroke, Tool};
///
/// let registry = LedgerRegistry::new();
/// let stroke = Stroke {
///     points: vec![Point::new(0.0, 0.0)],
///     tool: Tool::Eraser,
///     color: None,
///     stroke_width: 10.0,
/// };
///
/// let id = registry.with_room("lobby", |ledger| {
///     ledger.append(Operation::stamp(stroke, "user-1")).id().clone()
/// });
/// assert!(registry.get_operation("lobby", id.as_str()).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LedgerRegistry {
    rooms: Arc<RwLock<HashMap<String, SharedLedger>>>,
}

impl LedgerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the ledger for a room, creating it if this is the first reference.
    ///
    /// Concurrent first references to the same room observe the same ledger.
    #[must_use]
    pub fn get_or_create(&self, room_id: &str) -> SharedLedger {
        if let Some(ledger) = self.get(room_id) {
            return ledger;
        }
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(rooms.entry(room_id.to_string()).or_insert_with(|| {
            tracing::debug!(room_id = %room_id, "Created room ledger");
            Arc::new(Mutex::new(RoomLedger::new()))
        }))
    }

    /// Get the ledger for a room if it exists.
    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<SharedLedger> {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        rooms.get(room_id).cloned()
    }

    /// Whether a ledger exists for the room.
    #[must_use]
    pub fn contains(&self, room_id: &str) -> bool {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        rooms.contains_key(room_id)
    }

    /// Run `f` with exclusive access to a room's ledger, creating it if needed.
    pub fn with_room<F, R>(&self, room_id: &str, f: F) -> R
    where
        F: FnOnce(&mut RoomLedger) -> R,
    {
        let ledger = self.get_or_create(room_id);
        let mut guard = lock(&ledger);
        f(&mut guard)
    }

    /// Run `f` with exclusive access to an existing room's ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::RoomNotFound`] if the room has no ledger.
    pub fn with_existing_room<F, R>(&self, room_id: &str, f: F) -> LedgerResult<R>
    where
        F: FnOnce(&mut RoomLedger) -> R,
    {
        let ledger = self
            .get(room_id)
            .ok_or_else(|| LedgerError::RoomNotFound(room_id.to_string()))?;
        let mut guard = lock(&ledger);
        Ok(f(&mut guard))
    }

    /// Copy of a room's history, or `None` for an unknown room.
    #[must_use]
    pub fn snapshot(&self, room_id: &str) -> Option<Vec<Operation>> {
        self.with_existing_room(room_id, |ledger| ledger.snapshot().to_vec())
            .ok()
    }

    /// Look up an operation. Unknown rooms and unknown ids are both "not found".
    #[must_use]
    pub fn get_operation(&self, room_id: &str, operation_id: &str) -> Option<Operation> {
        self.with_existing_room(room_id, |ledger| ledger.get(operation_id).cloned())
            .ok()
            .flatten()
    }

    /// Remove an operation from a room's history, independent of undo.
    ///
    /// Unknown rooms and unknown ids are no-ops returning `None`.
    pub fn remove_operation(&self, room_id: &str, operation_id: &str) -> Option<Operation> {
        self.with_existing_room(room_id, |ledger| ledger.remove_by_id(operation_id))
            .ok()
            .flatten()
    }

    /// Drop a room's ledger. Returns true if the room existed.
    pub fn remove(&self, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        let removed = rooms.remove(room_id).is_some();
        if removed {
            tracing::info!(room_id = %room_id, "Removed room ledger");
        }
        removed
    }

    /// Ids of every room with a ledger, sorted.
    #[must_use]
    pub fn room_ids(&self) -> Vec<String> {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of rooms with a ledger.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no room has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the room map can be read right now without blocking.
    ///
    /// A poisoned map is still readable and counts as accessible.
    #[must_use]
    pub fn is_accessible(&self) -> bool {
        match self.rooms.try_read() {
            Ok(_) | Err(TryLockError::Poisoned(_)) => true,
            Err(TryLockError::WouldBlock) => false,
        }
    }
}

/// Lock a ledger, recovering from a poisoned mutex.
///
/// Ledger methods leave the ledger consistent at every return point, so the
/// data behind a poisoned lock is still usable.
pub fn lock(ledger: &Mutex<RoomLedger>) -> MutexGuard<'_, RoomLedger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}
