//! Room presence and per-connection fan-out.
//!
//! Every joined connection owns an unbounded outbox drained by its socket task.
//! A [`SubscriberSet`] holds the outboxes of one room; the
//! [`SubscriberRegistry`] maps room ids to their sets and forgets a room once
//! its last subscriber leaves. Ledgers are unaffected by presence.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;

/// Colors handed out to participants, in allocation order.
pub const PALETTE: [&str; 12] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
    "#469990", "#9a6324", "#800000", "#000075",
];

/// Sending half of a connection's outbox.
///
/// The queue is unbounded: a reader that never drains grows its queue without
/// limit and never slows the room. A bounded per-subscriber queue with a drop
/// or disconnect policy would replace this alias.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// A participant as announced to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection id, also used as the author of stamped operations.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Palette color assigned on join.
    pub color: String,
}

/// Who receives a room broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience<'a> {
    /// Every subscriber of the room.
    Everyone,
    /// Every subscriber except the one with this user id.
    Except(&'a str),
}

impl Audience<'_> {
    fn includes(self, user_id: &str) -> bool {
        match self {
            Self::Everyone => true,
            Self::Except(excluded) => excluded != user_id,
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    participant: Participant,
    outbox: Outbox,
}

/// Subscribers of one room, in join order.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    members: Vec<Subscriber>,
}

impl SubscriberSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber, replacing any previous entry with the same user id.
    pub fn insert(&mut self, participant: Participant, outbox: Outbox) {
        self.remove(&participant.user_id);
        self.members.push(Subscriber {
            participant,
            outbox,
        });
    }

    /// Remove a subscriber, returning its participant record.
    pub fn remove(&mut self, user_id: &str) -> Option<Participant> {
        let position = self
            .members
            .iter()
            .position(|s| s.participant.user_id == user_id)?;
        Some(self.members.remove(position).participant)
    }

    /// Whether the user is subscribed.
    #[must_use]
    pub fn contains(&self, user_id: &str) -> bool {
        self.members.iter().any(|s| s.participant.user_id == user_id)
    }

    /// Participant record for a user.
    #[must_use]
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.members
            .iter()
            .map(|s| &s.participant)
            .find(|p| p.user_id == user_id)
    }

    /// Roster in join order.
    #[must_use]
    pub fn participants(&self) -> Vec<Participant> {
        self.members.iter().map(|s| s.participant.clone()).collect()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// First palette color no subscriber is using.
    ///
    /// Once every color is taken the palette cycles by room size.
    #[must_use]
    pub fn next_color(&self) -> String {
        PALETTE
            .iter()
            .find(|color| !self.members.iter().any(|s| s.participant.color == **color))
            .unwrap_or(&PALETTE[self.members.len() % PALETTE.len()])
            .to_string()
    }

    /// Enqueue a message for the audience. Closed outboxes are skipped.
    ///
    /// Returns the number of outboxes that accepted the message.
    pub fn broadcast(&self, message: &ServerMessage, audience: Audience<'_>) -> usize {
        self.members
            .iter()
            .filter(|s| audience.includes(&s.participant.user_id))
            .filter(|s| s.outbox.send(message.clone()).is_ok())
            .count()
    }

    /// Enqueue a message for one subscriber. Returns false if absent or closed.
    pub fn send_to(&self, user_id: &str, message: ServerMessage) -> bool {
        self.members
            .iter()
            .find(|s| s.participant.user_id == user_id)
            .is_some_and(|s| s.outbox.send(message).is_ok())
    }
}

/// Thread-safe map of room id to subscriber set.
#[derive(Debug, Clone, Default)]
pub struct SubscriberRegistry {
    rooms: Arc<RwLock<HashMap<String, SubscriberSet>>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to a room's set, creating it if needed.
    ///
    /// A set left empty by `f` is dropped.
    pub fn update<F, R>(&self, room_id: &str, f: F) -> R
    where
        F: FnOnce(&mut SubscriberSet) -> R,
    {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        let set = rooms.entry(room_id.to_string()).or_default();
        let result = f(set);
        if set.is_empty() {
            rooms.remove(room_id);
        }
        result
    }

    /// Run `f` with shared access to a room's set, if it has subscribers.
    pub fn read<F, R>(&self, room_id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&SubscriberSet) -> R,
    {
        let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
        rooms.get(room_id).map(f)
    }

    /// Broadcast to a room. Unknown rooms deliver to nobody.
    pub fn broadcast(&self, room_id: &str, message: &ServerMessage, audience: Audience<'_>) -> usize {
        self.read(room_id, |set| set.broadcast(message, audience))
            .unwrap_or(0)
    }

    /// Number of subscribers in a room.
    #[must_use]
    pub fn participant_count(&self, room_id: &str) -> usize {
        self.read(room_id, SubscriberSet::len).unwrap_or(0)
    }

    /// Number of rooms with at least one subscriber.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no room has subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
