// rest/mod.rs — Public HTTP surface of the capture service.
//
// Axum HTTP server bound per config (default 127.0.0.1:3001).
//
// Endpoints:
//   GET /capture?url=<url>&w=<width>&h=<height>
//   GET /test-connection?url=<url>
//   GET /status
//   GET /health

pub mod routes;

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("capture API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/capture", get(routes::capture::capture))
        .route(
            "/test-connection",
            get(routes::test_connection::test_connection),
        )
        .route("/status", get(routes::status::status))
        .route("/health", get(routes::health::health))
        // Dashboard tooling on other origins calls this service directly.
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Resolves on SIGINT or, on unix, SIGTERM, which is what container
/// runtimes send first.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
