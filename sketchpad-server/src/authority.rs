//! # Synchronization Authority
//!
//! Turns client intents into ledger changes and room broadcasts.
//!
//! | Intent      | Ledger              | Audience          |
//! |-------------|---------------------|-------------------|
//! | join        | read-only snapshot  | joiner, then others |
//! | draw        | `append`            | all but sender    |
//! | undo        | `undo`              | everyone          |
//! | redo        | `redo`              | everyone          |
//! | clear       | `clear`             | everyone          |
//! | cursor-move | none                | all but sender    |
//! | leave       | none                | all but leaver    |
//!
//! Ledger-changing intents enqueue their broadcast while the room's ledger lock
//! is held, so every subscriber sees events in ledger order. The lock order is
//! ledger first, subscriber sets second.

use serde::Serialize;
use sketchpad_core::registry::lock;
use sketchpad_core::{LedgerRegistry, Operation, OperationId};
use thiserror::Error;

use crate::metrics::{record_ledger_operation, record_validation_failure, set_rooms};
use crate::presence::{Audience, Outbox, Participant, SubscriberRegistry};
use crate::protocol::{ServerMessage, StrokeCandidate};
use crate::validation::{normalize_username, validate_room_id, validate_stroke, ValidationError};

/// Reasons an intent was not applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthorityError {
    /// The connection has not joined a room.
    #[error("connection has not joined a room")]
    NotJoined,

    /// The requested room id is malformed.
    #[error("invalid room: {0}")]
    InvalidRoom(ValidationError),

    /// The draw payload failed validation.
    #[error("invalid stroke: {0}")]
    InvalidStroke(ValidationError),
}

/// Read-only view of a room for HTTP inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room id.
    pub room_id: String,
    /// Operations in the room's history.
    pub operation_count: usize,
    /// Operations available to redo.
    pub undo_depth: usize,
    /// Connected participants.
    pub participants: usize,
}

/// Applies intents to room ledgers and fans the results out.
#[derive(Debug, Clone, Default)]
pub struct SyncAuthority {
    ledgers: LedgerRegistry,
    subscribers: SubscriberRegistry,
}

impl SyncAuthority {
    /// Create an authority with an empty ledger registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The ledger registry.
    #[must_use]
    pub fn ledgers(&self) -> &LedgerRegistry {
        &self.ledgers
    }

    /// The subscriber registry.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriberRegistry {
        &self.subscribers
    }

    /// Subscribe a connection to a room.
    ///
    /// The joiner receives `initial-state` (snapshot, roster, own color) as the
    /// first message in its outbox; everyone already present receives
    /// `user-joined`. The snapshot is taken and queued under the ledger lock,
    /// so later events follow it without gaps or repeats.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::InvalidRoom`] for a malformed room id.
    pub fn join(
        &self,
        room_id: &str,
        user_id: &str,
        username: Option<&str>,
        outbox: Outbox,
    ) -> Result<Participant, AuthorityError> {
        validate_room_id(room_id).map_err(|e| {
            record_validation_failure(e.kind());
            AuthorityError::InvalidRoom(e)
        })?;
        let username = normalize_username(username);

        let ledger = self.ledgers.get_or_create(room_id);
        set_rooms(self.ledgers.len());
        let guard = lock(&ledger);

        let participant = self.subscribers.update(room_id, |set| {
            let participant = Participant {
                user_id: user_id.to_string(),
                username,
                color: set.next_color(),
            };
            set.remove(user_id);
            let mut users = set.participants();
            users.push(participant.clone());
            set.insert(participant.clone(), outbox);

            // A closed outbox means the socket is already gone; the join still
            // completes and the disconnect path removes it.
            set.send_to(
                user_id,
                ServerMessage::InitialState {
                    operations: guard.snapshot().to_vec(),
                    users,
                    user_color: participant.color.clone(),
                },
            );
            set.broadcast(
                &ServerMessage::UserJoined(participant.clone()),
                Audience::Except(user_id),
            );
            participant
        });
        drop(guard);

        tracing::info!(
            room_id = %room_id,
            user_id = %user_id,
            username = %participant.username,
            "Participant joined room"
        );
        Ok(participant)
    }

    /// Validate, stamp and append a stroke, then send it to everyone else.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorityError::InvalidStroke`] when the payload is rejected;
    /// nothing is appended or broadcast in that case.
    pub fn draw(
        &self,
        room_id: &str,
        user_id: &str,
        candidate: &StrokeCandidate,
    ) -> Result<Operation, AuthorityError> {
        let stroke = validate_stroke(candidate).map_err(|e| {
            record_validation_failure(e.kind());
            AuthorityError::InvalidStroke(e)
        })?;

        let operation = self.ledgers.with_room(room_id, |ledger| {
            let operation = ledger.append(Operation::stamp(stroke, user_id)).clone();
            self.subscribers.broadcast(
                room_id,
                &ServerMessage::Draw(operation.clone()),
                Audience::Except(user_id),
            );
            operation
        });

        record_ledger_operation("draw");
        tracing::debug!(
            room_id = %room_id,
            user_id = %user_id,
            operation_id = %operation.id(),
            points = operation.points().len(),
            "Applied draw"
        );
        Ok(operation)
    }

    /// Undo the room's latest operation and tell everyone, sender included.
    ///
    /// Returns `None` (and broadcasts nothing) when there is nothing to undo or
    /// the room is unknown.
    pub fn undo(&self, room_id: &str) -> Option<OperationId> {
        let undone = self
            .ledgers
            .with_existing_room(room_id, |ledger| {
                let operation_id = ledger.undo()?.id().clone();
                self.subscribers.broadcast(
                    room_id,
                    &ServerMessage::Undo {
                        operation_id: operation_id.clone(),
                    },
                    Audience::Everyone,
                );
                Some(operation_id)
            })
            .ok()
            .flatten()?;

        record_ledger_operation("undo");
        tracing::debug!(room_id = %room_id, operation_id = %undone, "Applied undo");
        Some(undone)
    }

    /// Redo the most recently undone operation and tell everyone.
    ///
    /// The operation is reinstated at the end of the history. Returns `None`
    /// (and broadcasts nothing) when the undo stack is empty or the room is
    /// unknown.
    pub fn redo(&self, room_id: &str) -> Option<Operation> {
        let redone = self
            .ledgers
            .with_existing_room(room_id, |ledger| {
                let operation = ledger.redo()?.clone();
                self.subscribers.broadcast(
                    room_id,
                    &ServerMessage::Redo {
                        operation: operation.clone(),
                    },
                    Audience::Everyone,
                );
                Some(operation)
            })
            .ok()
            .flatten()?;

        record_ledger_operation("redo");
        tracing::debug!(room_id = %room_id, operation_id = %redone.id(), "Applied redo");
        Some(redone)
    }

    /// Wipe the room's history and undo stack and tell everyone.
    ///
    /// Returns false for an unknown room.
    pub fn clear(&self, room_id: &str) -> bool {
        let cleared = self
            .ledgers
            .with_existing_room(room_id, |ledger| {
                ledger.clear();
                self.subscribers
                    .broadcast(room_id, &ServerMessage::ClearCanvas, Audience::Everyone);
            })
            .is_ok();

        if cleared {
            record_ledger_operation("clear");
            tracing::debug!(room_id = %room_id, "Cleared canvas");
        }
        cleared
    }

    /// Relay a pointer position to everyone else in the room.
    pub fn cursor_move(&self, room_id: &str, user_id: &str, x: f64, y: f64) {
        self.subscribers.broadcast(
            room_id,
            &ServerMessage::CursorMove {
                user_id: user_id.to_string(),
                x,
                y,
            },
            Audience::Except(user_id),
        );
    }

    /// Remove a connection from a room and tell the others.
    ///
    /// The room's ledger is left untouched. Returns the departed participant,
    /// or `None` if the connection was not subscribed.
    pub fn leave(&self, room_id: &str, user_id: &str) -> Option<Participant> {
        let departed = self.subscribers.update(room_id, |set| {
            let departed = set.remove(user_id)?;
            set.broadcast(
                &ServerMessage::UserLeft {
                    user_id: departed.user_id.clone(),
                    username: departed.username.clone(),
                },
                Audience::Everyone,
            );
            Some(departed)
        })?;

        tracing::info!(
            room_id = %room_id,
            user_id = %user_id,
            username = %departed.username,
            "Participant left room"
        );
        Some(departed)
    }

    /// Summaries of every room with a ledger, sorted by room id.
    #[must_use]
    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.ledgers
            .room_ids()
            .into_iter()
            .filter_map(|room_id| {
                let (operation_count, undo_depth) = self
                    .ledgers
                    .with_existing_room(&room_id, |ledger| (ledger.len(), ledger.undo_depth()))
                    .ok()?;
                let participants = self.subscribers.participant_count(&room_id);
                Some(RoomSummary {
                    room_id,
                    operation_count,
                    undo_depth,
                    participants,
                })
            })
            .collect()
    }

    /// Copy of a room's history, or `None` for an unknown room.
    #[must_use]
    pub fn room_snapshot(&self, room_id: &str) -> Option<Vec<Operation>> {
        self.ledgers.snapshot(room_id)
    }
}
