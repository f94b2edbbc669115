//! Core data types shared across the store, sequencer, presence, and wire
//! protocol layers.
//!
//! DESIGN
//! ======
//! Rows are soft-typed at the JSON boundary (`serde_json::Value` columns)
//! but strongly typed in-process as tagged enums. `DrawEvent` is immutable
//! once constructed; only the Sequencer is permitted to mint one with a
//! real `seq`.
//!
//! Every wire message carries a `type` discriminator and an optional
//! `payload`, per the external interface contract; `EventPayload` follows
//! the same adjacent-tag shape (`{"type": "stroke", "payload": {...}}`) one
//! level down, since a `DrawEvent` itself nests a typed payload inside its
//! own envelope fields (`boardId`, `seq`, `userId`, `timestamp`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// BOARD
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Board {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub owner_id: Option<Uuid>,
    pub is_private: bool,
}

// =============================================================================
// DRAW EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rectangle,
    Ellipse,
    Line,
}

/// A single mutation of a board's canvas. Adjacently tagged so the wire
/// shape is `{"type": "stroke", "payload": {...fields}}`, matching §3's
/// payload table one-to-one per type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum EventPayload {
    Stroke {
        stroke_id: Uuid,
        color: String,
        width: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        opacity: Option<f64>,
        points: Vec<Point>,
    },
    Shape {
        stroke_id: Uuid,
        shape_type: ShapeType,
        start: Point,
        end: Point,
        color: String,
        width: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        opacity: Option<f64>,
    },
    Text {
        stroke_id: Uuid,
        text: String,
        position: Point,
        color: String,
        font_size: f64,
    },
    Delete {
        stroke_ids: Vec<Uuid>,
    },
    Clear {},
}

impl EventPayload {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stroke { .. } => "stroke",
            Self::Shape { .. } => "shape",
            Self::Text { .. } => "text",
            Self::Delete { .. } => "delete",
            Self::Clear {} => "clear",
        }
    }
}

/// An immutable, server-ordered mutation of a board's canvas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawEvent {
    pub board_id: Uuid,
    pub seq: i64,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// A rasterized prefix of a board's history pinned at a specific `seq`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub board_id: Uuid,
    pub seq: i64,
    /// Base64-encoded PNG bytes, per the persisted-layout contract.
    pub image_data: String,
    pub offset_x: f64,
    pub offset_y: f64,
    pub created_at: DateTime<Utc>,
}

/// Output of the snapshot engine's replay-to-raster pass.
pub struct SnapshotResult {
    pub png_bytes: Vec<u8>,
    pub offset_x: f64,
    pub offset_y: f64,
}

// =============================================================================
// IDENTITY & PRESENCE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub display_name: String,
    pub is_anonymous: bool,
    pub avatar_color: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cursor {
    pub x: f64,
    pub y: f64,
    pub t: i64,
}

/// The ephemeral per-user state within a room: identity plus an optional
/// last cursor. Lives only in memory; one record per `(boardId, userId)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub user_id: Uuid,
    pub display_name: String,
    pub is_anonymous: bool,
    pub avatar_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
    #[serde(skip)]
    pub connected_at: DateTime<Utc>,
}
