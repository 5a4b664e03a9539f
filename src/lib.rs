pub mod config;
pub mod dispatcher;
pub mod encoder;
pub mod http;
pub mod ids;
pub mod route_selector;
pub mod session;
pub mod state;
pub mod time;
pub mod timeout;
pub mod ws_session;

pub use config::Config;
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Assemble the single listener that serves both the WebSocket upgrade path
/// and the management HTTP surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_session::ws_handler))
        .route("/health", get(http::health::health))
        .route(
            "/@connections/:id",
            get(http::connections::get_connection)
                .post(http::connections::post_to_connection)
                .delete(http::connections::delete_connection),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured port and serve until a shutdown signal arrives,
/// closing every live session before the listener stops.
pub async fn run(config: Config) -> std::io::Result<()> {
    let port = config.port;
    let state = AppState::new(config);
    let router = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "gateway emulator listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown(state))
    .await?;

    info!("gateway emulator shut down gracefully");
    Ok(())
}

/// Waits for SIGTERM/Ctrl-C, then closes every live session with code 1001
/// before letting the listener stop. `DISCONNECT` is not dispatched for
/// these closes — shutdown does not guarantee delivery to the backend.
async fn shutdown(state: AppState) {
    wait_for_signal().await;
    info!("shutdown signal received, closing live sessions");

    let connection_ids: Vec<String> = state.sessions.read().await.keys().cloned().collect();
    for connection_id in connection_ids {
        ws_session::terminate(
            &state,
            &connection_id,
            1001,
            "Server shutting down",
            false,
        )
        .await;
    }
}

async fn wait_for_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C"); },
        _ = terminate => { info!("received SIGTERM"); },
    }
}
