//! HTTP surface: `POST /process`, `GET /health`, `GET /tasks/:task_id`.

pub mod routes;
pub mod state;

use std::error::Error;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Bind and serve until Ctrl+C or SIGTERM.
///
/// Tasks already accepted keep running on the runtime after the listener
/// stops; `main` decides how long to wait for them.
pub async fn serve(state: AppState) -> Result<(), Box<dyn Error + Send + Sync>> {
    let server = &state.config.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;

    let app = routes::create_router(state.clone()).layer(TraceLayer::new_for_http());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::select! {
                _ = signal::ctrl_c() => info!("Received Ctrl+C signal"),
                _ = wait_for_sigterm() => info!("Received SIGTERM signal"),
            }
            info!("Starting graceful shutdown");
        })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not install SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
