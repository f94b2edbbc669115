//! WebSocket handler — the protocol router and session lifecycle.
//!
//! DESIGN
//! ======
//! On upgrade, the connection gets a fresh id and enters a `select!` loop:
//! inbound text frames are parsed and dispatched; anything queued onto the
//! connection's own channel (by a dispatch handler, a room broadcast, or the
//! cursor batch task) is written back out. Handlers never touch the socket
//! directly — they only ever go through `PresenceManager::send_to` and
//! `PresenceManager::broadcast` — so the socket has exactly one writer.
//!
//! STATE MACHINE
//! ==============
//! `New -> Joined -> Closed`. In `New`, only `HELLO`, `PING`, and
//! `CREATE_BOARD` are accepted; anything else yields `NOT_JOINED`. A second
//! `HELLO` on an already-joined connection is a hard error (`JOIN_FAILED`) —
//! see the design notes on this open question.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::identity;
use crate::model::Board;
use crate::protocol::{ClientMessage, ErrorCodeWire, ServerMessage, SnapshotView};
use crate::rate_limit::Class;
use crate::state::AppState;
use crate::store;

const CLIENT_CHANNEL_CAPACITY: usize = 256;

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

struct Session {
    conn_id: Uuid,
    joined_board: Option<Uuid>,
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CLIENT_CHANNEL_CAPACITY);
    state.presence.register(conn_id, tx).await;

    let mut session = Session { conn_id, joined_board: None };

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => dispatch(&state, &mut session, &text).await,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(out) = rx.recv() => {
                let text = match serde_json::to_string(&out) {
                    Ok(t) => t,
                    Err(e) => { warn!(error = %e, "failed to encode outbound message"); continue }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.rate_limiter.forget(conn_id);
    if let Some((board_id, user_id)) = state.presence.leave(conn_id).await {
        state.presence.broadcast(board_id, ServerMessage::UserLeave { board_id, user_id }, None).await;
        info!(%conn_id, %board_id, %user_id, "ws: client left");
    }
}

async fn dispatch(state: &AppState, session: &mut Session, text: &str) {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!(conn_id = %session.conn_id, error = %e, "ws: invalid inbound frame");
            reply(state, session, ServerMessage::error(ErrorCodeWire::InvalidJson, e.to_string())).await;
            return;
        }
    };

    match message {
        ClientMessage::Hello { board_id, auth_token, client_id, display_name, is_anonymous, resume_from_seq } => {
            handle_hello(state, session, board_id, auth_token, client_id, display_name, is_anonymous, resume_from_seq)
                .await;
        }
        ClientMessage::DrawEvent(payload) => handle_draw_event(state, session, payload).await,
        ClientMessage::CursorMove { x, y } => handle_cursor_move(state, session, x, y).await,
        ClientMessage::Ping {} => reply(state, session, ServerMessage::Pong {}).await,
        ClientMessage::LeaveBoard {} => handle_leave_board(state, session).await,
        ClientMessage::CreateBoard { name, is_private, clerk_token } => {
            handle_create_board(state, session, name, is_private, clerk_token).await;
        }
    }
}

async fn reply(state: &AppState, session: &Session, message: ServerMessage) {
    state.presence.send_to(session.conn_id, message).await;
}

fn not_joined_guard(session: &Session) -> bool {
    session.joined_board.is_some()
}

#[allow(clippy::too_many_arguments)]
async fn handle_hello(
    state: &AppState,
    session: &mut Session,
    board_id: Uuid,
    auth_token: Option<String>,
    client_id: Option<String>,
    display_name: Option<String>,
    is_anonymous: bool,
    resume_from_seq: Option<i64>,
) {
    if not_joined_guard(session) {
        reply(state, session, ServerMessage::error(ErrorCodeWire::JoinFailed, "already joined on this connection"))
            .await;
        return;
    }

    let verified_user = state.access.verify(auth_token.as_deref());

    let board = match store::get_board(&state.pool, board_id).await {
        Ok(Some(board)) => board,
        Ok(None) => match store::create_board(&state.pool, board_id, None, None, false).await {
            Ok(board) => board,
            Err(e) => {
                warn!(%board_id, error = %e, "ws: failed to create board on first reference");
                reply(state, session, ServerMessage::error(ErrorCodeWire::JoinFailed, e.to_string())).await;
                return;
            }
        },
        Err(e) => {
            warn!(%board_id, error = %e, "ws: failed to load board");
            reply(state, session, ServerMessage::error(ErrorCodeWire::JoinFailed, e.to_string())).await;
            return;
        }
    };

    if let Err(reason) = state.access.can_join(&board, verified_user) {
        reply(state, session, ServerMessage::AccessDenied { board_id, reason }).await;
        return;
    }

    let identity = identity::resolve(verified_user, client_id.as_deref(), display_name, is_anonymous);

    reply(
        state,
        session,
        ServerMessage::Welcome {
            user_id: identity.user_id,
            display_name: identity.display_name.clone(),
            avatar_color: identity.avatar_color.clone(),
        },
    )
    .await;

    // Join the room (and enter `Joined`) before reading sync state: any
    // event sequenced from here on is guaranteed to reach this connection
    // via broadcast, so the only possible overlap with `deliver_sync`'s own
    // read is a harmless duplicate the client dedups by `seq`.
    let presence = state.presence.join(session.conn_id, board_id, identity).await;
    session.joined_board = Some(board_id);

    if let Err(e) = deliver_sync(state, session, &board, resume_from_seq).await {
        warn!(%board_id, error = %e, "ws: sync delivery failed");
        state.presence.leave(session.conn_id).await;
        session.joined_board = None;
        reply(state, session, ServerMessage::error(ErrorCodeWire::JoinFailed, e.to_string())).await;
        return;
    }

    let users = state.presence.presences(board_id).await;
    reply(state, session, ServerMessage::UserList { board_id, users }).await;

    state
        .presence
        .broadcast(board_id, ServerMessage::UserJoin { board_id, user: presence }, Some(session.conn_id))
        .await;

    info!(conn_id = %session.conn_id, %board_id, "ws: client joined");
}

async fn deliver_sync(
    state: &AppState,
    session: &Session,
    board: &Board,
    resume_from_seq: Option<i64>,
) -> Result<(), store::StoreError> {
    let last_seq = store::max_seq(&state.pool, board.id).await?;

    let (is_delta, events, snapshot) = match resume_from_seq {
        Some(resume) if resume > 0 => {
            let events = store::events_after(&state.pool, board.id, resume).await?;
            (true, events, None)
        }
        _ => match store::get_snapshot(&state.pool, board.id).await? {
            Some(snap) => {
                let events = store::events_after(&state.pool, board.id, snap.seq).await?;
                let view = SnapshotView {
                    image_data: snap.image_data,
                    seq: snap.seq,
                    offset_x: snap.offset_x,
                    offset_y: snap.offset_y,
                };
                (false, events, Some(view))
            }
            None => {
                let events = store::events(&state.pool, board.id).await?;
                (false, events, None)
            }
        },
    };

    reply(state, session, ServerMessage::SyncSnapshot { board_id: board.id, events, last_seq, is_delta, snapshot })
        .await;
    Ok(())
}

async fn handle_draw_event(state: &AppState, session: &Session, payload: crate::model::EventPayload) {
    let Some(board_id) = session.joined_board else {
        reply(state, session, ServerMessage::error(ErrorCodeWire::NotJoined, "join a board before drawing")).await;
        return;
    };

    if !state.rate_limiter.try_take(session.conn_id, Class::Draw) {
        return;
    }

    let Some(user_id) = state.presence.user_id_of(session.conn_id).await else {
        reply(state, session, ServerMessage::error(ErrorCodeWire::NotJoined, "no active presence for connection"))
            .await;
        return;
    };

    let presence = state.presence.clone();
    let result = state
        .sequencer
        .sequence_and_dispatch(board_id, user_id, payload, |event| async move {
            presence.broadcast(board_id, ServerMessage::DrawEvent(event), None).await;
        })
        .await;

    match result {
        Ok(seq) => state.snapshots.maybe_trigger(board_id, seq),
        Err(e) => {
            warn!(%board_id, error = %e, "ws: draw event failed to sequence");
            reply(state, session, ServerMessage::error(ErrorCodeWire::DrawFailed, e.to_string())).await;
        }
    }
}

async fn handle_cursor_move(state: &AppState, session: &Session, x: f64, y: f64) {
    if session.joined_board.is_none() {
        reply(state, session, ServerMessage::error(ErrorCodeWire::NotJoined, "join a board before moving a cursor"))
            .await;
        return;
    }

    if !state.rate_limiter.try_take(session.conn_id, Class::Cursor) {
        return;
    }

    if let Some((board_id, user_id, display_name, avatar_color)) =
        state.presence.update_cursor(session.conn_id, x, y).await
    {
        state.presence.queue_cursor(board_id, user_id, display_name, avatar_color, x, y).await;
    }
}

async fn handle_leave_board(state: &AppState, session: &mut Session) {
    if let Some((board_id, user_id)) = state.presence.leave(session.conn_id).await {
        state.presence.broadcast(board_id, ServerMessage::UserLeave { board_id, user_id }, None).await;
    }
    session.joined_board = None;
}

async fn handle_create_board(
    state: &AppState,
    session: &Session,
    name: Option<String>,
    is_private: bool,
    clerk_token: Option<String>,
) {
    let Some(owner_id) = state.access.verify(clerk_token.as_deref()) else {
        reply(state, session, ServerMessage::error(ErrorCodeWire::Unauthorized, "a valid token is required")).await;
        return;
    };

    let board_id = Uuid::new_v4();
    match store::create_board(&state.pool, board_id, name.as_deref(), Some(owner_id), is_private).await {
        Ok(board) => {
            reply(state, session, ServerMessage::BoardCreated { board_id: board.id, name: Some(board.name), is_private })
                .await;
        }
        Err(e) => {
            warn!(error = %e, "ws: board creation failed");
            reply(state, session, ServerMessage::error(ErrorCodeWire::CreateFailed, e.to_string())).await;
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
