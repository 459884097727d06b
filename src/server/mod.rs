//! HTTP surface for interactive web detection.
//!
//! Exposes the callable `detectWeb` endpoint plus a health check. Caller
//! identity is taken from a header set by the fronting gateway, which is
//! responsible for verifying the caller's token.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use crate::config::Config;
use crate::repository::{open_store, ImageDocRepository};
use crate::services::DetectService;
use crate::vision::VisionClient;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub detect: Arc<DetectService>,
    /// Lowercase name of the header carrying the caller uid.
    pub identity_header: String,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let store = open_store(&config.store)?;
        let images = ImageDocRepository::new(
            store,
            config.store.images_collection.clone(),
            config.store.id_lists_collection.clone(),
        );
        let vision = VisionClient::new(config.vision.clone())?;
        let detect = DetectService::new(images, Arc::new(vision), config.storage.clone());

        Ok(Self {
            detect: Arc::new(detect),
            identity_header: config.server.identity_header.to_ascii_lowercase(),
        })
    }
}

/// Start the web server and run until Ctrl+C or SIGTERM.
pub async fn serve(config: &Config, bind: &str) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let app = create_router(state);

    let addr: SocketAddr = bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
