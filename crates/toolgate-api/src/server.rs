//! HTTP server assembly: middleware stack, graceful shutdown, tracing init.
//! No TLS termination or rate limiting here — this facade expects both to
//! sit in front of it, behind a load balancer or reverse proxy.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware as axum_middleware, Router};
use tokio::signal;

use crate::middleware::{body_limit_layer, cors_layer, request_id_middleware, timeout_layer, tracing_middleware};
use crate::routes::api_router;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub timeout: Duration,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".parse().unwrap(),
            timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("TOOLGATE_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);
        let timeout_secs: u64 = std::env::var("TOOLGATE_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);
        let max_body_size: usize = std::env::var("TOOLGATE_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024 * 1024);

        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            timeout: Duration::from_secs(timeout_secs),
            max_body_size,
        }
    }
}

/// Builds the full router for `state`, with the middleware stack applied
/// bottom-to-top: compression and body limits outermost, tracing/request-id
/// next, CORS closest to the routes.
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    api_router(state.clone())
        .layer(tower_http::compression::CompressionLayer::new())
        .layer(body_limit_layer(config.max_body_size))
        .layer(timeout_layer(config.timeout))
        .layer(cors_layer())
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(axum_middleware::from_fn_with_state(state, tracing_middleware))
}

/// Serves `router` on `addr` until a shutdown signal arrives.
pub async fn run(router: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "toolgate listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server shutdown complete");
    Ok(())
}

pub async fn shutdown_signal() {
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
        _ = ctrl_c => tracing::info!("received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,toolgate_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_default_port_is_8080() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
