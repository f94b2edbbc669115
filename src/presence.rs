//! Presence Manager — connections, identities, rooms, and cursor batching.
//!
//! DESIGN
//! ======
//! One global `RwLock`-guarded map, sharded conceptually by board through
//! the structure of the maps themselves rather than through N separate
//! locks (per-board sharding is also spec-legal, but a single lock keeps the
//! room/cursor bookkeeping atomic with respect to each other, and none of
//! these operations hold the lock across an await other than the channel
//! send, which is itself non-blocking for a bounded `mpsc::Sender`).
//!
//! A room is created lazily on the first `join` for a board and torn down
//! when its connection set empties. A rejoin under the same `userId`
//! replaces that user's presence record outright — the old connection's
//! entry in the room's connection set is untouched until its own `leave`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::model::{Cursor, Presence, UserIdentity};
use crate::protocol::{CursorEntry, ServerMessage};

pub type ConnId = Uuid;

struct PresenceInner {
    conn_identity: HashMap<ConnId, UserIdentity>,
    conn_board: HashMap<ConnId, Uuid>,
    rooms: HashMap<Uuid, HashSet<ConnId>>,
    senders: HashMap<ConnId, mpsc::Sender<ServerMessage>>,
    presences: HashMap<Uuid, HashMap<Uuid, Presence>>,
    cursor_buffer: HashMap<Uuid, HashMap<Uuid, CursorEntry>>,
}

#[derive(Clone)]
pub struct PresenceManager {
    inner: Arc<RwLock<PresenceInner>>,
}

impl PresenceManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(PresenceInner {
                conn_identity: HashMap::new(),
                conn_board: HashMap::new(),
                rooms: HashMap::new(),
                senders: HashMap::new(),
                presences: HashMap::new(),
                cursor_buffer: HashMap::new(),
            })),
        }
    }

    /// Register a connection's outbound channel. Must be called before
    /// `join` so fan-out can reach it immediately.
    pub async fn register(&self, conn: ConnId, tx: mpsc::Sender<ServerMessage>) {
        self.inner.write().await.senders.insert(conn, tx);
    }

    /// Place a connection into a board's room, replacing any existing
    /// presence for the same `userId`. Returns the new presence record.
    pub async fn join(&self, conn: ConnId, board_id: Uuid, identity: UserIdentity) -> Presence {
        let presence = Presence {
            user_id: identity.user_id,
            display_name: identity.display_name.clone(),
            is_anonymous: identity.is_anonymous,
            avatar_color: identity.avatar_color.clone(),
            cursor: None,
            connected_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner.conn_identity.insert(conn, identity);
        inner.conn_board.insert(conn, board_id);
        inner.rooms.entry(board_id).or_default().insert(conn);
        inner.presences.entry(board_id).or_default().insert(presence.user_id, presence.clone());
        presence
    }

    /// Remove a connection from its room. Returns `(boardId, userId)` if it
    /// was joined to one. Idempotent: calling twice on the same connection
    /// is a no-op the second time.
    pub async fn leave(&self, conn: ConnId) -> Option<(Uuid, Uuid)> {
        let mut inner = self.inner.write().await;
        inner.senders.remove(&conn);
        let identity = inner.conn_identity.remove(&conn)?;
        let board_id = inner.conn_board.remove(&conn)?;

        if let Some(room) = inner.rooms.get_mut(&board_id) {
            room.remove(&conn);
            if room.is_empty() {
                inner.rooms.remove(&board_id);
                inner.presences.remove(&board_id);
                inner.cursor_buffer.remove(&board_id);
            } else {
                // Only drop the shared presence record if no other live
                // connection in the room still carries this user_id.
                let still_present = room.iter().any(|other| {
                    inner.conn_identity.get(other).is_some_and(|id| id.user_id == identity.user_id)
                });
                if !still_present {
                    if let Some(presences) = inner.presences.get_mut(&board_id) {
                        presences.remove(&identity.user_id);
                    }
                }
            }
        }

        Some((board_id, identity.user_id))
    }

    /// Update a connection's live cursor in its presence record. Returns the
    /// fields needed to queue a batched broadcast, if the connection is
    /// joined.
    pub async fn update_cursor(&self, conn: ConnId, x: f64, y: f64) -> Option<(Uuid, Uuid, String, String)> {
        let mut inner = self.inner.write().await;
        let board_id = *inner.conn_board.get(&conn)?;
        let identity = inner.conn_identity.get(&conn)?.clone();

        if let Some(presence) = inner.presences.get_mut(&board_id).and_then(|m| m.get_mut(&identity.user_id)) {
            presence.cursor = Some(Cursor { x, y, t: Utc::now().timestamp_millis() });
        }

        Some((board_id, identity.user_id, identity.display_name, identity.avatar_color))
    }

    /// Coalesce a cursor position into the board's pending batch buffer,
    /// overwriting any prior entry for the same user this tick.
    pub async fn queue_cursor(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        display_name: String,
        avatar_color: String,
        x: f64,
        y: f64,
    ) {
        let mut inner = self.inner.write().await;
        inner.cursor_buffer.entry(board_id).or_default().insert(
            user_id,
            CursorEntry { user_id, display_name, avatar_color: Some(avatar_color), x, y },
        );
    }

    /// Drain every board's pending cursor buffer, returning one batch per
    /// board that had entries. Called once per tick by the batch task.
    pub async fn drain_cursor_batches(&self) -> Vec<(Uuid, Vec<CursorEntry>)> {
        let mut inner = self.inner.write().await;
        let boards: Vec<Uuid> = inner.cursor_buffer.keys().copied().collect();
        let mut batches = Vec::new();
        for board_id in boards {
            if let Some(buffer) = inner.cursor_buffer.get_mut(&board_id) {
                if buffer.is_empty() {
                    continue;
                }
                let entries: Vec<CursorEntry> = buffer.values().cloned().collect();
                buffer.clear();
                batches.push((board_id, entries));
            }
        }
        batches
    }

    /// The resolved `userId` for a connection, if it is currently joined.
    pub async fn user_id_of(&self, conn: ConnId) -> Option<Uuid> {
        self.inner.read().await.conn_identity.get(&conn).map(|identity| identity.user_id)
    }

    /// The set of connections currently joined to a board.
    pub async fn connections(&self, board_id: Uuid) -> Vec<ConnId> {
        self.inner.read().await.rooms.get(&board_id).map(|set| set.iter().copied().collect()).unwrap_or_default()
    }

    /// Live presence records for a board.
    pub async fn presences(&self, board_id: Uuid) -> Vec<Presence> {
        self.inner.read().await.presences.get(&board_id).map(|m| m.values().cloned().collect()).unwrap_or_default()
    }

    /// Send one message to every connection in a room whose write side is
    /// still open, optionally excluding one connection (the sender, for
    /// fan-out that already replied directly). A write failure silently
    /// drops that connection's copy — its own recv loop will observe the
    /// channel closing and trigger its leave path independently.
    pub async fn broadcast(&self, board_id: Uuid, message: ServerMessage, exclude: Option<ConnId>) {
        let targets: Vec<mpsc::Sender<ServerMessage>> = {
            let inner = self.inner.read().await;
            let Some(room) = inner.rooms.get(&board_id) else { return };
            room.iter()
                .filter(|conn| Some(**conn) != exclude)
                .filter_map(|conn| inner.senders.get(conn).cloned())
                .collect()
        };
        for tx in targets {
            let _ = tx.send(message.clone()).await;
        }
    }

    /// Send one message directly to a single connection.
    pub async fn send_to(&self, conn: ConnId, message: ServerMessage) {
        let tx = self.inner.read().await.senders.get(&conn).cloned();
        if let Some(tx) = tx {
            let _ = tx.send(message).await;
        }
    }
}

impl Default for PresenceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
