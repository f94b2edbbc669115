use super::*;
use crate::config::Config;
use crate::state::AppState;
use tokio::time::{Duration, timeout};

fn test_config() -> Config {
    Config {
        database_url: "postgres://example/db".to_owned(),
        port: 3000,
        auth_secret_key: None,
        db_max_connections: 5,
        compaction_threshold: 5000,
        cursor_batch_ms: 50,
        draw_bucket_size: 30,
        draw_refill_rate: 60.0,
        cursor_bucket_size: 60,
        cursor_refill_rate: 120.0,
    }
}

async fn test_state() -> AppState {
    let pool = sqlx::postgres::PgPoolOptions::new().connect_lazy("postgres://example/db").expect("lazy pool");
    AppState::new(pool, &test_config())
}

async fn recv_soon(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_millis(200), rx.recv()).await.expect("recv timed out").expect("channel closed")
}

async fn wired_session(state: &AppState) -> (Session, mpsc::Receiver<ServerMessage>) {
    let conn_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(8);
    state.presence.register(conn_id, tx).await;
    (Session { conn_id, joined_board: None }, rx)
}

#[tokio::test]
async fn ping_replies_with_pong() {
    let state = test_state().await;
    let (mut session, mut rx) = wired_session(&state).await;

    dispatch(&state, &mut session, r#"{"type":"PING"}"#).await;

    assert!(matches!(recv_soon(&mut rx).await, ServerMessage::Pong {}));
}

#[tokio::test]
async fn invalid_json_yields_invalid_json_error() {
    let state = test_state().await;
    let (mut session, mut rx) = wired_session(&state).await;

    dispatch(&state, &mut session, "not json").await;

    match recv_soon(&mut rx).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCodeWire::InvalidJson),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn draw_event_before_join_yields_not_joined() {
    let state = test_state().await;
    let (mut session, mut rx) = wired_session(&state).await;

    let draw = r#"{
        "type": "DRAW_EVENT",
        "payload": {
            "type": "clear",
            "payload": {}
        }
    }"#;
    dispatch(&state, &mut session, draw).await;

    match recv_soon(&mut rx).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCodeWire::NotJoined),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn cursor_move_before_join_yields_not_joined() {
    let state = test_state().await;
    let (mut session, mut rx) = wired_session(&state).await;

    dispatch(&state, &mut session, r#"{"type":"CURSOR_MOVE","payload":{"x":1.0,"y":2.0}}"#).await;

    match recv_soon(&mut rx).await {
        ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCodeWire::NotJoined),
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[tokio::test]
async fn leave_board_resets_session_state_without_a_prior_join() {
    let state = test_state().await;
    let (mut session, _rx) = wired_session(&state).await;

    handle_leave_board(&state, &mut session).await;
    assert!(session.joined_board.is_none());
}
