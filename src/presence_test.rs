use super::*;
use crate::model::UserIdentity;
use tokio::time::{Duration, timeout};

fn identity(user_id: Uuid) -> UserIdentity {
    UserIdentity { user_id, display_name: "Ann".to_owned(), is_anonymous: false, avatar_color: "#ff0000".to_owned() }
}

async fn recv_soon(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
    timeout(Duration::from_millis(200), rx.recv()).await.expect("recv timed out").expect("channel closed")
}

async fn recv_empty(rx: &mut mpsc::Receiver<ServerMessage>) {
    assert!(timeout(Duration::from_millis(80), rx.recv()).await.is_err(), "expected no message");
}

#[tokio::test]
async fn join_then_leave_removes_presence_and_room() {
    let pm = PresenceManager::new();
    let board_id = Uuid::new_v4();
    let conn = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let (tx, _rx) = mpsc::channel(8);
    pm.register(conn, tx).await;
    pm.join(conn, board_id, identity(user_id)).await;

    assert_eq!(pm.connections(board_id).await, vec![conn]);
    assert_eq!(pm.presences(board_id).await.len(), 1);

    let left = pm.leave(conn).await;
    assert_eq!(left, Some((board_id, user_id)));
    assert!(pm.connections(board_id).await.is_empty());
    assert!(pm.presences(board_id).await.is_empty());
}

#[tokio::test]
async fn leave_is_idempotent() {
    let pm = PresenceManager::new();
    let conn = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    pm.register(conn, tx).await;
    pm.join(conn, Uuid::new_v4(), identity(Uuid::new_v4())).await;

    assert!(pm.leave(conn).await.is_some());
    assert!(pm.leave(conn).await.is_none());
}

#[tokio::test]
async fn leave_keeps_shared_presence_while_other_connection_remains() {
    let pm = PresenceManager::new();
    let board_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let conn_a = Uuid::new_v4();
    let conn_b = Uuid::new_v4();

    let (tx_a, _rx_a) = mpsc::channel(8);
    let (tx_b, _rx_b) = mpsc::channel(8);
    pm.register(conn_a, tx_a).await;
    pm.register(conn_b, tx_b).await;
    pm.join(conn_a, board_id, identity(user_id)).await;
    pm.join(conn_b, board_id, identity(user_id)).await;

    pm.leave(conn_a).await;

    // The shared user is still present via conn_b.
    assert_eq!(pm.presences(board_id).await.len(), 1);
    assert_eq!(pm.connections(board_id).await, vec![conn_b]);
}

#[tokio::test]
async fn broadcast_excludes_sender_and_reaches_others() {
    let pm = PresenceManager::new();
    let board_id = Uuid::new_v4();
    let conn_a = Uuid::new_v4();
    let conn_b = Uuid::new_v4();

    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    pm.register(conn_a, tx_a).await;
    pm.register(conn_b, tx_b).await;
    pm.join(conn_a, board_id, identity(Uuid::new_v4())).await;
    pm.join(conn_b, board_id, identity(Uuid::new_v4())).await;

    pm.broadcast(board_id, ServerMessage::Pong {}, Some(conn_a)).await;

    recv_empty(&mut rx_a).await;
    assert!(matches!(recv_soon(&mut rx_b).await, ServerMessage::Pong {}));
}

#[tokio::test]
async fn drain_cursor_batches_returns_and_clears_pending_entries() {
    let pm = PresenceManager::new();
    let board_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    pm.queue_cursor(board_id, user_id, "Ann".to_owned(), "#ff0000".to_owned(), 1.0, 2.0).await;

    let batches = pm.drain_cursor_batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, board_id);
    assert_eq!(batches[0].1.len(), 1);

    // A second drain before any new queue_cursor call finds nothing.
    assert!(pm.drain_cursor_batches().await.is_empty());
}

#[tokio::test]
async fn user_id_of_reflects_join_and_clears_on_leave() {
    let pm = PresenceManager::new();
    let conn = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    pm.register(conn, tx).await;

    assert_eq!(pm.user_id_of(conn).await, None);
    pm.join(conn, Uuid::new_v4(), identity(user_id)).await;
    assert_eq!(pm.user_id_of(conn).await, Some(user_id));
    pm.leave(conn).await;
    assert_eq!(pm.user_id_of(conn).await, None);
}
