use super::*;

fn test_config() -> Config {
    Config {
        database_url: "postgres://example/db".to_owned(),
        port: 3000,
        auth_secret_key: None,
        db_max_connections: 5,
        compaction_threshold: 5000,
        cursor_batch_ms: 42,
        draw_bucket_size: 7,
        draw_refill_rate: 8.0,
        cursor_bucket_size: 9,
        cursor_refill_rate: 10.0,
    }
}

#[test]
fn new_threads_cursor_batch_ms_from_config() {
    let config = test_config();
    let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy("postgres://example/db").expect("lazy pool");
    let state = AppState::new(pool, &config);
    assert_eq!(state.cursor_batch_ms, 42);
}

#[test]
fn new_threads_draw_and_cursor_rate_limits_from_config() {
    let config = test_config();
    let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy("postgres://example/db").expect("lazy pool");
    let state = AppState::new(pool, &config);

    // draw_bucket_size is 7, so the eighth draw in a burst must be dropped.
    let conn = uuid::Uuid::new_v4();
    for _ in 0..7 {
        assert!(state.rate_limiter.try_take(conn, crate::rate_limit::Class::Draw));
    }
    assert!(!state.rate_limiter.try_take(conn, crate::rate_limit::Class::Draw));
}
