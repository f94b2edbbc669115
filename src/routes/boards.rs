//! Board management REST routes.
//!
//! DESIGN
//! ======
//! Every route but `/health` requires a verified bearer token; `AuthUser`
//! extracts and verifies it once, up front, and rejects with 401 before the
//! handler body runs at all.

use axum::extract::{FromRef, Path, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Board;
use crate::state::AppState;
use crate::store::{self, StoreError};

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// A verified caller, required by every board-management route.
pub struct AuthUser {
    pub user_id: Uuid,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        app_state.access.verify(token).map(|user_id| Self { user_id }).ok_or(StatusCode::UNAUTHORIZED)
    }
}

// =============================================================================
// RESPONSE TYPES
// =============================================================================

#[derive(Serialize)]
pub struct BoardResponse {
    pub id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<Utc>,
    pub name: String,
    #[serde(rename = "ownerId")]
    pub owner_id: Option<Uuid>,
    #[serde(rename = "isPrivate")]
    pub is_private: bool,
}

impl From<Board> for BoardResponse {
    fn from(b: Board) -> Self {
        Self { id: b.id, created_at: b.created_at, name: b.name, owner_id: b.owner_id, is_private: b.is_private }
    }
}

#[derive(Deserialize)]
pub struct CreateBoardBody {
    pub name: Option<String>,
    #[serde(rename = "isPrivate", default)]
    pub is_private: bool,
}

fn store_error_to_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::BoardNotFound(_) | StoreError::NotOwner(_) => StatusCode::NOT_FOUND,
        StoreError::SeqCollision { .. } | StoreError::Database(_) | StoreError::Decode(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/boards` — list boards owned by the verified user.
pub async fn list_boards(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<BoardResponse>>, StatusCode> {
    let boards = store::get_user_boards(&state.pool, auth.user_id).await.map_err(|e| store_error_to_status(&e))?;
    Ok(Json(boards.into_iter().map(BoardResponse::from).collect()))
}

/// `POST /api/boards` — create a board with a fresh id, owned by the
/// verified user.
pub async fn create_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateBoardBody>,
) -> Result<Json<BoardResponse>, StatusCode> {
    let id = Uuid::new_v4();
    let board = store::create_board(&state.pool, id, body.name.as_deref(), Some(auth.user_id), body.is_private)
        .await
        .map_err(|e| store_error_to_status(&e))?;
    Ok(Json(board.into()))
}

/// `GET /api/boards/:id` — fetch a single board's metadata.
pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BoardResponse>, StatusCode> {
    let board = store::get_board(&state.pool, id).await.map_err(|e| store_error_to_status(&e))?;
    let Some(board) = board else { return Err(StatusCode::NOT_FOUND) };

    if board.is_private && board.owner_id != Some(auth.user_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(board.into()))
}

/// `DELETE /api/boards/:id` — delete a board and its events; 404 if not
/// owned by the caller.
pub async fn delete_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    store::delete_board(&state.pool, id, auth.user_id).await.map_err(|e| store_error_to_status(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
}

/// `GET /health` — liveness probe, no auth required.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok", timestamp: Utc::now() })
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
