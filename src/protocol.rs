//! Wire protocol — the typed JSON message set exchanged over the websocket.
//!
//! DESIGN
//! ======
//! Every frame has a `type` discriminator and an optional `payload`, decoded
//! with serde's adjacently-tagged enums so the router never hand-rolls
//! dispatch on a string field. `DRAW_EVENT` nests one level deeper: its own
//! `payload` is itself a `{"type": "stroke", "payload": {...}}` value
//! (`EventPayload`, see `model.rs`), so a draw frame on the wire looks like
//! `{"type":"DRAW_EVENT","payload":{"type":"stroke","payload":{...}}}`.
//! Client and server message sets are distinct types: a connection only ever
//! decodes `ClientMessage` and only ever encodes `ServerMessage`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{DrawEvent, EventPayload, Presence};

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Hello {
        board_id: Uuid,
        auth_token: Option<String>,
        client_id: Option<String>,
        display_name: Option<String>,
        #[serde(default)]
        is_anonymous: bool,
        resume_from_seq: Option<i64>,
    },
    DrawEvent(EventPayload),
    CursorMove {
        x: f64,
        y: f64,
    },
    Ping {},
    LeaveBoard {},
    CreateBoard {
        name: Option<String>,
        #[serde(default)]
        is_private: bool,
        clerk_token: Option<String>,
    },
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub image_data: String,
    pub seq: i64,
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorEntry {
    pub user_id: Uuid,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_color: Option<String>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCodeWire {
    InvalidJson,
    UnknownMessage,
    NotJoined,
    Unauthorized,
    JoinFailed,
    DrawFailed,
    CreateFailed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        user_id: Uuid,
        display_name: String,
        avatar_color: String,
    },
    SyncSnapshot {
        board_id: Uuid,
        events: Vec<DrawEvent>,
        last_seq: i64,
        is_delta: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<SnapshotView>,
    },
    DrawEvent(DrawEvent),
    CursorBatch {
        board_id: Uuid,
        cursors: Vec<CursorEntry>,
    },
    UserList {
        board_id: Uuid,
        users: Vec<Presence>,
    },
    UserJoin {
        board_id: Uuid,
        user: Presence,
    },
    UserLeave {
        board_id: Uuid,
        user_id: Uuid,
    },
    BoardCreated {
        board_id: Uuid,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        is_private: bool,
    },
    AccessDenied {
        board_id: Uuid,
        reason: String,
    },
    Error {
        code: ErrorCodeWire,
        message: String,
    },
    Pong {},
}

impl ServerMessage {
    #[must_use]
    pub fn error(code: ErrorCodeWire, message: impl Into<String>) -> Self {
        Self::Error { code, message: message.into() }
    }
}

/// Shared by every module with fallible operations so frame-level errors can
/// be reported with a grepable wire code instead of a bare string.
pub trait ErrorCode: std::fmt::Display {
    fn wire_code(&self) -> ErrorCodeWire;
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
