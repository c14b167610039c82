//! WebSocket Server
//!
//! HTTP/WebSocket layer for bandcast, built with Axum.
//!
//! # Endpoints
//!
//! - `GET /ws` - viewer connection; inbound filter commands, outbound raw
//!   sample records
//! - `GET /health/live` - liveness probe
//! - `GET /health/ready` - readiness probe (dispatcher still running)
//! - `GET /health` - full health status
//!
//! Viewers send filter updates as JSON text frames:
//!
//! ```text
//! {"action": "add", "interface": "eth0"}
//! {"action": "remove", "interface": "eth0"}
//! ```
//!
//! and receive every matching sample record verbatim, one per frame.

mod handler;
mod state;

pub use handler::websocket_handler;
pub use state::AppState;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Full health status body
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub connections: usize,
    pub uptime_seconds: u64,
    pub version: String,
}

/// Build the router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let health_routes = Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/", get(full_health));

    Router::new()
        .route("/ws", get(websocket_handler))
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ServerError> {
    let router = build_router(Arc::new(state));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("bandcast listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("bandcast shut down gracefully");
    Ok(())
}

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 while the dispatcher is still draining the sample queue;
/// once the queue closes the hub can no longer deliver anything.
async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.dispatcher_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with connection count and uptime.
async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.dispatcher_alive() {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        connections: state.registry.connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::ConnectionRegistry;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::util::ServiceExt;

    fn test_app() -> (Router, Arc<AtomicBool>) {
        let alive = Arc::new(AtomicBool::new(true));
        let state = AppState::new(
            Arc::new(ConnectionRegistry::new(16)),
            ServerConfig::default(),
            Arc::clone(&alive),
        );
        (build_router(Arc::new(state)), alive)
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _alive) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (app, _alive) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_fails_after_dispatcher_exit() {
        let (app, alive) = test_app();
        alive.store(false, Ordering::SeqCst);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _alive) = test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
