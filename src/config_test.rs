use super::*;

#[test]
fn defaults_match_spec_table() {
    assert_eq!(default_port(), 3000);
    assert_eq!(default_db_max_connections(), 5);
    assert_eq!(default_compaction_threshold(), 5000);
    assert_eq!(default_cursor_batch_ms(), 50);
    assert_eq!(default_draw_bucket_size(), 30);
    assert!((default_draw_refill_rate() - 60.0).abs() < f64::EPSILON);
    assert_eq!(default_cursor_bucket_size(), 60);
    assert!((default_cursor_refill_rate() - 120.0).abs() < f64::EPSILON);
}

#[test]
fn deserializes_from_explicit_map() {
    let vars = vec![("database_url".to_owned(), "postgres://example/db".to_owned())];
    let config: Config = envy::from_iter(vars).expect("minimal config should deserialize");
    assert_eq!(config.database_url, "postgres://example/db");
    assert_eq!(config.port, default_port());
    assert!(config.auth_secret_key.is_none());
}

#[test]
fn auth_secret_key_round_trips_when_present() {
    let vars = vec![
        ("database_url".to_owned(), "postgres://example/db".to_owned()),
        ("auth_secret_key".to_owned(), "s3cr3t".to_owned()),
    ];
    let config: Config = envy::from_iter(vars).expect("config with secret should deserialize");
    assert_eq!(config.auth_secret_key.as_deref(), Some("s3cr3t"));
}
