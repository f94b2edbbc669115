//! Process configuration, loaded from the environment.
//!
//! DESIGN
//! ======
//! `.env` is loaded first, best-effort (a missing file is not an error —
//! only `DATABASE_URL` is mandatory). The remaining fields come from
//! `envy`, which deserializes the process environment straight into
//! `Config` via serde, so every tunable in spec §6 has exactly one
//! definition: the struct field and its default.

use serde::Deserialize;

fn default_port() -> u16 {
    3000
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_compaction_threshold() -> i64 {
    5000
}

fn default_cursor_batch_ms() -> u64 {
    50
}

fn default_draw_bucket_size() -> u32 {
    30
}

fn default_draw_refill_rate() -> f64 {
    60.0
}

fn default_cursor_bucket_size() -> u32 {
    60
}

fn default_cursor_refill_rate() -> f64 {
    120.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub auth_secret_key: Option<String>,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: i64,
    #[serde(default = "default_cursor_batch_ms")]
    pub cursor_batch_ms: u64,
    #[serde(default = "default_draw_bucket_size")]
    pub draw_bucket_size: u32,
    #[serde(default = "default_draw_refill_rate")]
    pub draw_refill_rate: f64,
    #[serde(default = "default_cursor_bucket_size")]
    pub cursor_bucket_size: u32,
    #[serde(default = "default_cursor_refill_rate")]
    pub cursor_refill_rate: f64,
}

impl Config {
    /// Load configuration from a best-effort `.env` file plus the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables (`DATABASE_URL`) are missing
    /// or a tunable fails to parse.
    pub fn from_env() -> Result<Self, envy::Error> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "no .env file loaded");
        }
        envy::from_env::<Config>()
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
