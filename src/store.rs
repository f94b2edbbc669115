//! Event Store — durable append-only log, board catalog, snapshot row.
//!
//! DESIGN
//! ======
//! A thin wrapper around the pool. Ordering above the single-row-per-append
//! guarantee is the Sequencer's job (see `sequencer.rs`); this module only
//! promises that `appendEvent` fails hard on a primary-key collision rather
//! than silently overwriting — any such collision means the sequencer has a
//! bug, and we want that to surface immediately.

use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::model::{Board, DrawEvent, EventPayload, Snapshot};
use crate::protocol::ErrorCodeWire;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("board not found: {0}")]
    BoardNotFound(Uuid),
    #[error("not authorized to delete board {0}")]
    NotOwner(Uuid),
    #[error("duplicate (board_id, seq) on append: board {board_id} seq {seq}")]
    SeqCollision { board_id: Uuid, seq: i64 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("event payload decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl crate::protocol::ErrorCode for StoreError {
    fn wire_code(&self) -> ErrorCodeWire {
        match self {
            Self::BoardNotFound(_) => ErrorCodeWire::JoinFailed,
            Self::NotOwner(_) => ErrorCodeWire::Unauthorized,
            Self::SeqCollision { .. } | Self::Database(_) | Self::Decode(_) => ErrorCodeWire::DrawFailed,
        }
    }
}

/// Fetch a board by id, if it exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn get_board(pool: &PgPool, id: Uuid) -> Result<Option<Board>, StoreError> {
    let board = sqlx::query_as::<_, Board>(
        "SELECT id, created_at, name, owner_id, is_private FROM boards WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(board)
}

/// Create a board. Caller picks the id (HELLO creates boards by referenced
/// id; the REST surface mints a fresh UUID before calling this).
///
/// # Errors
///
/// Returns an error if the insert fails.
pub async fn create_board(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    owner_id: Option<Uuid>,
    is_private: bool,
) -> Result<Board, StoreError> {
    let name = name.unwrap_or("Untitled Board");
    let row = sqlx::query_as::<_, Board>(
        "INSERT INTO boards (id, name, owner_id, is_private) VALUES ($1, $2, $3, $4)
         RETURNING id, created_at, name, owner_id, is_private",
    )
    .bind(id)
    .bind(name)
    .bind(owner_id)
    .bind(is_private)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Delete a board and its events. Authorization is enforced at the SQL
/// predicate: the delete only matches a row owned by `owner_id`.
///
/// # Errors
///
/// Returns an error if the delete fails for a reason other than
/// "not owned" (which is reported as `Ok(false)`... no — per spec this must
/// be a hard 404, so we surface `NotOwner`).
pub async fn delete_board(pool: &PgPool, id: Uuid, owner_id: Uuid) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM drawing_events WHERE board_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM board_snapshots WHERE board_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM boards WHERE id = $1 AND owner_id = $2")
        .bind(id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotOwner(id));
    }
    tx.commit().await?;
    Ok(())
}

/// List boards owned by a user, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn get_user_boards(pool: &PgPool, owner_id: Uuid) -> Result<Vec<Board>, StoreError> {
    let boards = sqlx::query_as::<_, Board>(
        "SELECT id, created_at, name, owner_id, is_private FROM boards
         WHERE owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?;
    Ok(boards)
}

/// Highest assigned `seq` for a board, or 0 if the board has no events.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn max_seq(pool: &PgPool, board_id: Uuid) -> Result<i64, StoreError> {
    let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS max_seq FROM drawing_events WHERE board_id = $1")
        .bind(board_id)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get::<i64, _>("max_seq")?)
}

/// Append one event. Fails hard on a `(board_id, seq)` primary-key
/// collision instead of silently succeeding.
///
/// # Errors
///
/// Returns `SeqCollision` if the primary key already exists, or a database
/// error for any other failure.
pub async fn append_event(pool: &PgPool, event: &DrawEvent) -> Result<(), StoreError> {
    let payload = serde_json::to_value(&event.payload)?;
    let result = sqlx::query(
        "INSERT INTO drawing_events (board_id, seq, event) VALUES ($1, $2, $3)
         ON CONFLICT (board_id, seq) DO NOTHING",
    )
    .bind(event.board_id)
    .bind(event.seq)
    .bind(row_with_envelope(event, &payload))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::SeqCollision { board_id: event.board_id, seq: event.seq });
    }
    Ok(())
}

fn row_with_envelope(event: &DrawEvent, payload: &Value) -> Value {
    serde_json::json!({
        "userId": event.user_id,
        "timestamp": event.timestamp,
        "payload": payload,
    })
}

fn decode_row(board_id: Uuid, seq: i64, event: Value) -> Result<DrawEvent, StoreError> {
    let user_id: Uuid = serde_json::from_value(event["userId"].clone())?;
    let timestamp = serde_json::from_value(event["timestamp"].clone())?;
    let payload: EventPayload = serde_json::from_value(event["payload"].clone())?;
    Ok(DrawEvent { board_id, seq, user_id, timestamp, payload })
}

/// All events for a board, ordered by `seq`.
///
/// # Errors
///
/// Returns an error if the query or decode fails.
pub async fn events(pool: &PgPool, board_id: Uuid) -> Result<Vec<DrawEvent>, StoreError> {
    events_after(pool, board_id, 0).await
}

/// Events for a board with `seq` strictly greater than `after`, ordered.
///
/// # Errors
///
/// Returns an error if the query or decode fails.
pub async fn events_after(pool: &PgPool, board_id: Uuid, after: i64) -> Result<Vec<DrawEvent>, StoreError> {
    let rows = sqlx::query("SELECT seq, event FROM drawing_events WHERE board_id = $1 AND seq > $2 ORDER BY seq ASC")
        .bind(board_id)
        .bind(after)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let seq: i64 = row.try_get("seq")?;
            let event: Value = row.try_get("event")?;
            decode_row(board_id, seq, event)
        })
        .collect()
}

/// The board's snapshot row, if one exists.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn get_snapshot(pool: &PgPool, board_id: Uuid) -> Result<Option<Snapshot>, StoreError> {
    let row = sqlx::query(
        "SELECT board_id, seq, image_data, offset_x, offset_y, created_at FROM board_snapshots WHERE board_id = $1",
    )
    .bind(board_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else { return Ok(None) };
    Ok(Some(Snapshot {
        board_id: row.try_get("board_id")?,
        seq: row.try_get("seq")?,
        image_data: row.try_get("image_data")?,
        offset_x: row.try_get("offset_x")?,
        offset_y: row.try_get("offset_y")?,
        created_at: row.try_get("created_at")?,
    }))
}

/// Upsert the board's snapshot row. Idempotent: calling it twice with the
/// same arguments leaves the same row.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn save_snapshot(
    pool: &PgPool,
    board_id: Uuid,
    seq: i64,
    image_data: &str,
    offset_x: f64,
    offset_y: f64,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO board_snapshots (board_id, seq, image_data, offset_x, offset_y, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (board_id) DO UPDATE SET
            seq = EXCLUDED.seq,
            image_data = EXCLUDED.image_data,
            offset_x = EXCLUDED.offset_x,
            offset_y = EXCLUDED.offset_y,
            created_at = EXCLUDED.created_at",
    )
    .bind(board_id)
    .bind(seq)
    .bind(image_data)
    .bind(offset_x)
    .bind(offset_y)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete the board's snapshot row, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn delete_snapshot(pool: &PgPool, board_id: Uuid) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM board_snapshots WHERE board_id = $1")
        .bind(board_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
