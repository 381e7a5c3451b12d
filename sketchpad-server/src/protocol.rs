//! # Wire Protocol
//!
//! JSON envelopes exchanged over the `/ws` endpoint. Every frame is one event,
//! tagged by its `type` field; field names are camelCase.
//!
//! ## Client -> Server
//!
//! - `{"type": "join-room", "roomId": "...", "username": "..."}`
//! - `{"type": "draw", "points": [{"x": 0, "y": 0}], "tool": "brush", "color": "#RRGGBB", "strokeWidth": 4}`
//! - `{"type": "cursor-move", "x": 10, "y": 20}`
//! - `{"type": "undo"}`
//! - `{"type": "redo"}`
//! - `{"type": "clear-canvas"}`
//!
//! ## Server -> Client
//!
//! - `{"type": "initial-state", "operations": [...], "users": [...], "userColor": "#RRGGBB"}`
//! - `{"type": "user-joined", "userId": "...", "username": "...", "color": "#RRGGBB"}`
//! - `{"type": "user-left", "userId": "...", "username": "..."}`
//! - `{"type": "draw", "id": "...", "userId": "...", "timestamp": 0, "points": [...], "tool": "brush", "color": "#RRGGBB", "strokeWidth": 4}`
//! - `{"type": "cursor-move", "userId": "...", "x": 10, "y": 20}`
//! - `{"type": "undo", "operationId": "..."}`
//! - `{"type": "redo", "operation": {...}}`
//! - `{"type": "clear-canvas"}`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sketchpad_core::{Operation, OperationId};

use crate::presence::Participant;

/// Untrusted draw payload as received from a client.
///
/// Every field is kept as raw JSON so that validation, not deserialization,
/// decides what is acceptable. Any `id`, `userId` or `timestamp` the client
/// sends is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrokeCandidate {
    /// Stroke points, expected to be `[{x, y}, ...]`.
    pub points: Option<Value>,
    /// Tool name, expected to be `brush` or `eraser`.
    pub tool: Option<Value>,
    /// Color, expected to be `#RRGGBB` unless the tool is the eraser.
    pub color: Option<Value>,
    /// Width, expected to be a number in `[1, 50]`.
    pub stroke_width: Option<Value>,
}

/// Client-to-server WebSocket message types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Enter a room (leaving any previous one).
    JoinRoom {
        /// Room to join.
        room_id: String,
        /// Display name; blank or missing names are replaced.
        #[serde(default)]
        username: Option<String>,
    },
    /// A completed stroke.
    Draw(StrokeCandidate),
    /// Pointer position, relayed to the rest of the room.
    CursorMove {
        /// Horizontal position.
        x: f64,
        /// Vertical position.
        y: f64,
    },
    /// Undo the latest operation in the room.
    Undo,
    /// Redo the most recently undone operation in the room.
    Redo,
    /// Wipe the room's canvas and history.
    ClearCanvas,
}

impl ClientMessage {
    /// Wire name of the message type, for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::Draw(_) => "draw",
            Self::CursorMove { .. } => "cursor-move",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::ClearCanvas => "clear-canvas",
        }
    }
}

/// Server-to-client WebSocket message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent only to a participant that just joined.
    InitialState {
        /// The room's history in replay order.
        operations: Vec<Operation>,
        /// Everyone in the room, the joiner included.
        users: Vec<Participant>,
        /// Color assigned to the joiner.
        user_color: String,
    },
    /// Someone else joined the room.
    UserJoined(Participant),
    /// Someone left the room.
    UserLeft {
        /// Connection id of the participant.
        user_id: String,
        /// Display name of the participant.
        username: String,
    },
    /// A stroke drawn by another participant.
    Draw(Operation),
    /// Another participant's pointer moved.
    CursorMove {
        /// Connection id of the participant.
        user_id: String,
        /// Horizontal position.
        x: f64,
        /// Vertical position.
        y: f64,
    },
    /// An operation was taken off the history.
    Undo {
        /// Id of the removed operation.
        operation_id: OperationId,
    },
    /// An undone operation was put back at the end of the history.
    Redo {
        /// The reinstated operation.
        operation: Operation,
    },
    /// The canvas and its history were wiped.
    ClearCanvas,
}

impl ServerMessage {
    /// Wire name of the message type, for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InitialState { .. } => "initial-state",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::Draw(_) => "draw",
            Self::CursorMove { .. } => "cursor-move",
            Self::Undo { .. } => "undo",
            Self::Redo { .. } => "redo",
            Self::ClearCanvas => "clear-canvas",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sketchpad_core::{Point, Stroke, Tool};

    fn sample_operation() -> Operation {
        Operation::with_timestamp(
            Stroke {
                points: vec![Point::new(1.0, 2.0)],
                tool: Tool::Brush,
                color: Some("#112233".to_string()),
                stroke_width: 5.0,
            },
            "user-1",
            1_700_000_000_000,
        )
    }

    #[test]
    fn test_client_message_parse_join_room() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join-room","roomId":"lobby","username":"Ada"}"#)
                .expect("should parse");
        assert_eq!(
            msg,
            ClientMessage::JoinRoom {
                room_id: "lobby".to_string(),
                username: Some("Ada".to_string()),
            }
        );
    }

    #[test]
    fn test_client_message_parse_join_room_without_username() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join-room","roomId":"lobby"}"#).expect("should parse");
        assert!(matches!(msg, ClientMessage::JoinRoom { username: None, .. }));
    }

    #[test]
    fn test_client_message_parse_draw_keeps_raw_fields() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "draw",
            "points": [{"x": 1, "y": 2}],
            "tool": "brush",
            "color": "#112233",
            "strokeWidth": 5,
            "id": "client-chosen",
            "timestamp": 1
        }))
        .expect("should parse");

        let ClientMessage::Draw(candidate) = msg else {
            panic!("expected draw");
        };
        assert_eq!(candidate.tool, Some(json!("brush")));
        assert_eq!(candidate.stroke_width, Some(json!(5)));
        assert_eq!(candidate.points, Some(json!([{"x": 1, "y": 2}])));
    }

    #[test]
    fn test_client_message_parse_malformed_draw_still_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"draw","points":"nope","strokeWidth":"wide"}"#)
                .expect("malformed draws reach validation");
        let ClientMessage::Draw(candidate) = msg else {
            panic!("expected draw");
        };
        assert_eq!(candidate.points, Some(json!("nope")));
        assert!(candidate.tool.is_none());
    }

    #[test]
    fn test_client_message_parse_unit_intents() {
        for (text, expected) in [
            (r#"{"type":"undo"}"#, ClientMessage::Undo),
            (r#"{"type":"redo"}"#, ClientMessage::Redo),
            (r#"{"type":"clear-canvas"}"#, ClientMessage::ClearCanvas),
        ] {
            let msg: ClientMessage = serde_json::from_str(text).expect("should parse");
            assert_eq!(msg, expected);
        }
    }

    #[test]
    fn test_client_message_parse_cursor_move() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"cursor-move","x":3.5,"y":4}"#).expect("should parse");
        assert_eq!(msg, ClientMessage::CursorMove { x: 3.5, y: 4.0 });
        assert_eq!(msg.kind(), "cursor-move");
    }

    #[test]
    fn test_client_message_rejects_unknown_type() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"erase-all"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"roomId":"lobby"}"#).is_err());
    }

    #[test]
    fn test_server_message_serialize_draw_flattens_operation() {
        let op = sample_operation();
        let json = serde_json::to_value(ServerMessage::Draw(op.clone())).expect("serialize");
        assert_eq!(json["type"], "draw");
        assert_eq!(json["id"], op.id().as_str());
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["timestamp"], 1_700_000_000_000_u64);
        assert_eq!(json["strokeWidth"], 5.0);
        assert_eq!(json["color"], "#112233");
    }

    #[test]
    fn test_server_message_serialize_undo() {
        let json = serde_json::to_value(ServerMessage::Undo {
            operation_id: OperationId::from("op-1"),
        })
        .expect("serialize");
        assert_eq!(json, json!({"type": "undo", "operationId": "op-1"}));
    }

    #[test]
    fn test_server_message_serialize_redo() {
        let op = sample_operation();
        let json = serde_json::to_value(ServerMessage::Redo {
            operation: op.clone(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "redo");
        assert_eq!(json["operation"]["id"], op.id().as_str());
    }

    #[test]
    fn test_server_message_serialize_clear_canvas() {
        let json = serde_json::to_value(ServerMessage::ClearCanvas).expect("serialize");
        assert_eq!(json, json!({"type": "clear-canvas"}));
    }

    #[test]
    fn test_server_message_serialize_initial_state() {
        let participant = Participant {
            user_id: "user-1".to_string(),
            username: "Ada".to_string(),
            color: "#e6194b".to_string(),
        };
        let json = serde_json::to_value(ServerMessage::InitialState {
            operations: vec![sample_operation()],
            users: vec![participant],
            user_color: "#e6194b".to_string(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "initial-state");
        assert_eq!(json["userColor"], "#e6194b");
        assert_eq!(json["users"][0]["userId"], "user-1");
        assert_eq!(json["operations"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_server_message_serialize_presence() {
        let joined = serde_json::to_value(ServerMessage::UserJoined(Participant {
            user_id: "u".to_string(),
            username: "Ada".to_string(),
            color: "#3cb44b".to_string(),
        }))
        .expect("serialize");
        assert_eq!(
            joined,
            json!({"type": "user-joined", "userId": "u", "username": "Ada", "color": "#3cb44b"})
        );

        let left = serde_json::to_value(ServerMessage::UserLeft {
            user_id: "u".to_string(),
            username: "Ada".to_string(),
        })
        .expect("serialize");
        assert_eq!(left, json!({"type": "user-left", "userId": "u", "username": "Ada"}));

        let cursor = serde_json::to_value(ServerMessage::CursorMove {
            user_id: "u".to_string(),
            x: 1.0,
            y: 2.0,
        })
        .expect("serialize");
        assert_eq!(cursor, json!({"type": "cursor-move", "userId": "u", "x": 1.0, "y": 2.0}));
    }

    #[test]
    fn test_server_message_round_trip_draw() {
        let message = ServerMessage::Draw(sample_operation());
        let text = serde_json::to_string(&message).expect("serialize");
        let parsed: ServerMessage = serde_json::from_str(&text).expect("parse");
        assert_eq!(parsed, message);
    }
}
