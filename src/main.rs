use collaboard::config::Config;
use collaboard::state::AppState;
use collaboard::{db, routes, services};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("failed to load configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let port = config.port;
    let state = AppState::new(pool, &config);

    let cursor_batch = services::cursor_batch::spawn(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await.expect("failed to bind");

    tracing::info!(%port, "collaboard listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    cursor_batch.abort();
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler");
    tracing::info!("shutdown signal received");
}
