//! Background task: the 50ms (configurable) cursor batch broadcaster.
//!
//! DESIGN
//! ======
//! One periodic task per process drains every board's pending cursor buffer
//! once per tick and fans out a single `CURSOR_BATCH` per board that had
//! activity. A user who moves 20 times in a tick still produces exactly one
//! outbound message per peer, since `queue_cursor` overwrites rather than
//! appends.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::protocol::ServerMessage;
use crate::state::AppState;

#[must_use]
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(state.cursor_batch_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let batches = state.presence.drain_cursor_batches().await;
            for (board_id, cursors) in batches {
                let message = ServerMessage::CursorBatch { board_id, cursors };
                state.presence.broadcast(board_id, message, None).await;
            }
        }
    })
}
