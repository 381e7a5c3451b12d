//! Per-room authoritative history with a global undo/redo stack.
//!
//! The ledger holds three structures:
//!
//! - `operations`: the canonical replay order of the room.
//! - `undo_stack`: operations taken off the tail by undo, most recent last.
//! - `index`: id → position in `operations`. It is a cache derived from
//!   `operations` and is only ever touched by the methods that change
//!   `operations`.
//!
//! Undo always targets the globally latest operation, whoever authored it.

use std::collections::HashMap;

use crate::operation::{Operation, OperationId};

/// Ordered operation log, undo stack and lookup index for one room.
#[derive(Debug, Clone, Default)]
pub struct RoomLedger {
    operations: Vec<Operation>,
    undo_stack: Vec<Operation>,
    index: HashMap<OperationId, usize>,
}

impl RoomLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validated, stamped operation.
    ///
    /// Discards the undo stack: redo is only possible right after an undo.
    pub fn append(&mut self, op: Operation) -> &Operation {
        debug_assert!(
            !self.index.contains_key(op.id()),
            "operation {} appended twice",
            op.id()
        );
        self.undo_stack.clear();
        self.push(op)
    }

    /// Remove an operation by id, wherever it sits in the history.
    ///
    /// Idempotent: removing an unknown id does nothing and returns `None`.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Operation> {
        let position = self.index.remove(id)?;
        let removed = self.operations.remove(position);
        for (offset, op) in self.operations[position..].iter().enumerate() {
            self.index.insert(op.id().clone(), position + offset);
        }
        Some(removed)
    }

    /// Look up an operation in the history.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.index.get(id).map(|&position| &self.operations[position])
    }

    /// The history in replay order.
    #[must_use]
    pub fn snapshot(&self) -> &[Operation] {
        &self.operations
    }

    /// Empty the history, the undo stack and the index.
    pub fn clear(&mut self) {
        self.operations.clear();
        self.undo_stack.clear();
        self.index.clear();
    }

    /// Take the latest operation off the history.
    ///
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<&Operation> {
        let op = self.operations.pop()?;
        self.index.remove(op.id());
        self.undo_stack.push(op);
        self.undo_stack.last()
    }

    /// Reinstate the most recently undone operation at the end of the history.
    ///
    /// Returns `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&Operation> {
        let op = self.undo_stack.pop()?;
        Some(self.push(op))
    }

    /// Number of operations in the history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations available to redo.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Whether an undo would do anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.operations.is_empty()
    }

    /// Whether a redo would do anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check that the index maps every history entry to its exact position and
    /// nothing else, and that no id appears twice across history and undo stack.
    #[must_use]
    pub fn index_is_consistent(&self) -> bool {
        if self.index.len() != self.operations.len() {
            return false;
        }
        let positions_match = self
            .operations
            .iter()
            .enumerate()
            .all(|(position, op)| self.index.get(op.id()) == Some(&position));
        let undone_unindexed = self
            .undo_stack
            .iter()
            .all(|op| !self.index.contains_key(op.id()));
        let mut undone_ids: Vec<&OperationId> = self.undo_stack.iter().map(Operation::id).collect();
        undone_ids.sort();
        undone_ids.dedup();
        positions_match && undone_unindexed && undone_ids.len() == self.undo_stack.len()
    }

    fn push(&mut self, op: Operation) -> &Operation {
        self.index.insert(op.id().clone(), self.operations.len());
        self.operations.push(op);
        &self.operations[self.operations.len() - 1]
    }
}
