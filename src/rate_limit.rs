//! Per-connection token-bucket rate limiting for draw and cursor messages.
//!
//! DESIGN
//! ======
//! Two independently-refilling buckets per connection, created lazily on
//! first use. Refill is computed from elapsed wall time against each
//! bucket's own `last_refill` instant, not a scheduler tick, so bursts after
//! an idle period are capped at `capacity` rather than accruing unboundedly.
//! Buckets for a connection are dropped with the connection's entry when it
//! disconnects (see `routes/ws.rs`); there is no separate GC pass.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Draw,
    Cursor,
}

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: f64, refill_per_sec: f64, now: Instant) -> Self {
        Self { tokens: capacity, capacity, refill_per_sec, last_refill: now }
    }

    fn try_take(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Tunables, normally sourced from `Config`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub draw_capacity: u32,
    pub draw_refill_per_sec: f64,
    pub cursor_capacity: u32,
    pub cursor_refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { draw_capacity: 30, draw_refill_per_sec: 60.0, cursor_capacity: 60, cursor_refill_per_sec: 120.0 }
    }
}

struct RateLimiterInner {
    draw: HashMap<Uuid, Bucket>,
    cursor: HashMap<Uuid, Bucket>,
    last_throttle_log: HashMap<(Uuid, &'static str), Instant>,
}

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    inner: std::sync::Arc<Mutex<RateLimiterInner>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            inner: std::sync::Arc::new(Mutex::new(RateLimiterInner {
                draw: HashMap::new(),
                cursor: HashMap::new(),
                last_throttle_log: HashMap::new(),
            })),
        }
    }

    /// Attempt to take one token from `conn`'s bucket for `class`. Returns
    /// `true` if the message should proceed, `false` if it must be dropped.
    /// On drop, logs at most once per second per `(conn, class)`.
    pub fn try_take(&self, conn: Uuid, class: Class) -> bool {
        self.try_take_at(conn, class, Instant::now())
    }

    fn try_take_at(&self, conn: Uuid, class: Class, now: Instant) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let (map, capacity, refill, label) = match class {
            Class::Draw => (&mut inner.draw, self.config.draw_capacity, self.config.draw_refill_per_sec, "draw"),
            Class::Cursor => {
                (&mut inner.cursor, self.config.cursor_capacity, self.config.cursor_refill_per_sec, "cursor")
            }
        };
        let bucket = map.entry(conn).or_insert_with(|| Bucket::new(f64::from(capacity), refill, now));
        let allowed = bucket.try_take(now);

        if !allowed {
            let key = (conn, label);
            let should_log = inner
                .last_throttle_log
                .get(&key)
                .is_none_or(|last| now.saturating_duration_since(*last) >= Duration::from_secs(1));
            if should_log {
                tracing::warn!(%conn, class = label, "rate limit: dropping message");
                inner.last_throttle_log.insert(key, now);
            }
        }
        allowed
    }

    /// Drop all state for a connection. Called on disconnect.
    pub fn forget(&self, conn: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        inner.draw.remove(&conn);
        inner.cursor.remove(&conn);
        inner.last_throttle_log.retain(|(c, _), _| *c != conn);
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
