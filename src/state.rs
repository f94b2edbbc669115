//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! owns the database pool and the process-global in-memory structures: the
//! sequencer's `nextSeq` counters, the presence/room maps, the rate
//! limiter's buckets, and the snapshot engine's compaction-in-progress set.
//! None of these are board-sharded at this layer — each owning module
//! shards internally where it matters (see `sequencer.rs`, `presence.rs`).

use sqlx::PgPool;

use crate::access::AccessControl;
use crate::config::Config;
use crate::presence::PresenceManager;
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::sequencer::Sequencer;
use crate::snapshot::SnapshotEngine;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sequencer: Sequencer,
    pub presence: PresenceManager,
    pub access: AccessControl,
    pub rate_limiter: RateLimiter,
    pub snapshots: SnapshotEngine,
    pub cursor_batch_ms: u64,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let rate_limit_config = RateLimitConfig {
            draw_capacity: config.draw_bucket_size,
            draw_refill_per_sec: config.draw_refill_rate,
            cursor_capacity: config.cursor_bucket_size,
            cursor_refill_per_sec: config.cursor_refill_rate,
        };

        Self {
            sequencer: Sequencer::new(pool.clone()),
            presence: PresenceManager::new(),
            access: AccessControl::new(config.auth_secret_key.clone()),
            rate_limiter: RateLimiter::new(rate_limit_config),
            snapshots: SnapshotEngine::new(pool.clone(), config.compaction_threshold),
            cursor_batch_ms: config.cursor_batch_ms,
            pool,
        }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
