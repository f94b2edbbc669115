//! Sequencer — per-board monotonic `seq` assignment.
//!
//! DESIGN
//! ======
//! A per-board `Mutex<Option<i64>>` holds the next `seq` to hand out; a
//! short-lived outer lock only guards getting-or-creating that per-board
//! entry, never the persist itself. Calls for the same board are totally
//! ordered by their board's own mutex; across boards, callers proceed in
//! parallel — a slow persist on one board never stalls another.
//!
//! The per-board lock is held across the caller's dispatch callback too, so
//! fan-out for a board is serialized in the same order as `seq` assignment:
//! no recipient can observe `seq k+1` before `seq k`. On a persist failure
//! the reservation is rolled back so no gap is ever visible to readers —
//! `maxSeq` and the counter always agree.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{DrawEvent, EventPayload};
use crate::protocol::ErrorCodeWire;
use crate::store::{self, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl crate::protocol::ErrorCode for SequencerError {
    fn wire_code(&self) -> ErrorCodeWire {
        match self {
            Self::Store(e) => e.wire_code(),
        }
    }
}

#[derive(Clone)]
pub struct Sequencer {
    pool: PgPool,
    boards: Arc<Mutex<HashMap<Uuid, Arc<Mutex<Option<i64>>>>>>,
}

impl Sequencer {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, boards: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Get or create this board's own lock. Held only long enough to clone
    /// the `Arc`, never across a persist.
    async fn board_lock(&self, board_id: Uuid) -> Arc<Mutex<Option<i64>>> {
        let mut boards = self.boards.lock().await;
        boards.entry(board_id).or_insert_with(|| Arc::new(Mutex::new(None))).clone()
    }

    /// Reserve, persist, and dispatch the next event for `board_id`.
    ///
    /// `dispatch` runs while this board's lock is still held, so fan-out
    /// order across concurrent callers on the same board matches `seq`
    /// order. Returns the assigned `seq` on success.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails. On failure the reservation is
    /// rolled back and `dispatch` is never called.
    pub async fn sequence_and_dispatch<F, Fut>(
        &self,
        board_id: Uuid,
        user_id: Uuid,
        payload: EventPayload,
        dispatch: F,
    ) -> Result<i64, SequencerError>
    where
        F: FnOnce(DrawEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        let lock = self.board_lock(board_id).await;
        let mut next_seq = lock.lock().await;

        let next = match *next_seq {
            Some(n) => n,
            None => store::max_seq(&self.pool, board_id).await? + 1,
        };

        let event = DrawEvent { board_id, seq: next, user_id, timestamp: Utc::now(), payload };

        match store::append_event(&self.pool, &event).await {
            Ok(()) => {
                *next_seq = Some(next + 1);
                let seq = event.seq;
                dispatch(event).await;
                Ok(seq)
            }
            Err(e) => {
                // Reservation never committed: next call re-derives from
                // max_seq and retries at the same `next`.
                *next_seq = None;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "sequencer_test.rs"]
mod tests;
