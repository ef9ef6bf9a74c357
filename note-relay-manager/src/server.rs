use axum::{
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_handler, list_local_handler, list_remote_handler, publish_handler};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/messages/local", get(list_local_handler).post(publish_handler))
        .route("/messages/remote", get(list_remote_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the HTTP listener. `host` may be a name such as `localhost`.
pub async fn bind_listener(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}:{}: {}", host, port, e))
}

/// Serve the API on an already bound listener until shutdown is signalled.
pub async fn serve(
    state: AppState,
    listener: TcpListener,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = build_router(state);

    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            tracing::info!("Server shutting down signal received");
        })
        .await?;

    Ok(())
}

pub async fn run_server(
    state: AppState,
    host: &str,
    port: u16,
    shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = bind_listener(host, port).await?;
    serve(state, listener, shutdown_rx).await
}
