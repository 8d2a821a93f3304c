use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use webhook_store::{SharedWebhookStore, memory_store, sqlite_store};

use crate::camera::HttpCameraServer;
use crate::config::{RelayConfig, StoreBackend};
use crate::gateway::Gateway;
use crate::line_api::HttpLineApi;

pub fn open_store(backend: &StoreBackend) -> Result<SharedWebhookStore> {
    match backend {
        StoreBackend::Memory => Ok(memory_store()),
        StoreBackend::Sqlite(path) => sqlite_store(path)
            .with_context(|| format!("open webhook store {}", path.display())),
    }
}

/// Wires the production collaborators into a [`Gateway`].
pub fn build_gateway(config: &RelayConfig) -> Result<Gateway> {
    let http = reqwest::Client::builder()
        .build()
        .context("build http client")?;
    let store = open_store(&config.store)?;
    let camera = HttpCameraServer::new(http.clone(), Some(config.camera_fetch_timeout));
    let line = HttpLineApi::new(
        http,
        Some(config.line_api_base.clone()),
        config.channel_token.clone(),
    );
    Ok(Gateway::new(
        config.channel_secret.clone(),
        store,
        Arc::new(camera),
        Arc::new(line),
    ))
}

pub async fn serve(config: RelayConfig) -> Result<()> {
    let gateway = build_gateway(&config)?;
    let app = gateway.router();

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        store = ?config.store,
        "camera-relay listening"
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    tracing::info!("camera-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
