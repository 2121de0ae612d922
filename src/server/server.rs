use std::net::SocketAddr;

use axum::http::Method;
use axum::routing::{delete, get};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::config::AllowedOrigin;
use crate::handlers;
use crate::registry::Registry;

/// Build the application router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origin);

    Router::new()
        .route("/", get(|| async { "Terminal Gateway" }))
        .route("/health", get(handlers::rest::health_check))
        .route("/ws", get(handlers::websocket::websocket_handler))
        .nest("/api", api_routes())
        .layer(cors)
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(handlers::rest::get_all_sessions))
        .route("/sessions/:session_id", get(handlers::rest::get_session))
        .route(
            "/sessions/:session_id",
            delete(handlers::rest::delete_session),
        )
}

fn cors_layer(origin: &AllowedOrigin) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::DELETE,
        Method::OPTIONS,
    ]);
    match origin {
        AllowedOrigin::Any => layer.allow_origin(Any).allow_headers(Any),
        AllowedOrigin::Exact(value) => layer.allow_origin(value.clone()).allow_headers(Any),
    }
}

/// Run the gateway until a termination signal arrives.
///
/// Shutdown ordering matters: every live session is killed before the
/// listener is released, so no shell process is left running without an
/// owner.
pub async fn run_server(router: Router, state: AppState) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    info!("gateway listening on http://{local}");
    info!("websocket channel available at ws://{local}/ws");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.registry.clone()))
        .await?;

    info!("server shutdown complete");
    Ok(())
}

/// Resolves once a termination signal has arrived and the registry has been
/// drained.
async fn shutdown_signal(registry: Registry) {
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
        _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
        _ = terminate => info!("received SIGTERM, initiating shutdown"),
    }

    let terminated = registry.shutdown().await;
    info!(sessions = terminated, "all sessions terminated");
}
