//! Listener setup and shutdown handling for the lot's HTTP front end.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::config::{ConfigError, parse_port};
use crate::service::LotService;

use super::routes::routes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `VALET_HOST` / `VALET_PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(host) = lookup("VALET_HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("VALET_PORT") {
            config.port = parse_port("VALET_PORT", &port)?;
        }
        Ok(config)
    }
}

/// Serve the lot until a signal or `POST /shutdown` stops it.
///
/// `host` may be an IP literal or a resolvable name such as `localhost`.
/// In-flight requests finish before this returns; the engine has already
/// saved after each of them.
pub async fn serve(config: ServerConfig, service: Arc<LotService>) -> anyhow::Result<()> {
    let shutdown_rx = service.shutdown_rx();
    let app = routes(service);

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;
    let addr = listener.local_addr()?;

    info!(%addr, "Lot accepting requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await?;

    info!("Lot server stopped");
    Ok(())
}

/// Resolves on a termination signal or once the service's shutdown flag is set.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed.
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("SIGINT handler must install on a tokio runtime");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler must install on a tokio runtime")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // A dropped sender means no request can ever stop the lot.
    let requested = async {
        if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let source = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
        _ = requested => "shutdown request",
    };
    info!(source, "Draining lot requests before exit");
}
