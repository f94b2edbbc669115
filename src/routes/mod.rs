//! Router assembly.

pub mod boards;
pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(ws::handle_ws))
        .route("/api/boards", get(boards::list_boards).post(boards::create_board))
        .route("/api/boards/{id}", get(boards::get_board).delete(boards::delete_board))
        .route("/health", get(boards::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
