//! Stand-in camera server. Answers the relay's liveness probe and hands out
//! fixed snapshot URLs, optionally registering itself with a relay first.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{Json, Router, extract::State, routing::get};
use camera_relay::{ControlClient, LogFormat, PortValue, SetWebhookRequest, telemetry};
use clap::Parser;
use serde_json::{Value, json};
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(name = "mock-camera", about = "Fake camera server for camera-relay")]
struct Opts {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0:8089")]
    listen: SocketAddr,

    /// URL returned as the full-size image
    #[arg(long, default_value = "https://example.com/original.jpg")]
    original: String,

    /// URL returned as the thumbnail
    #[arg(long, default_value = "https://example.com/preview.jpg")]
    preview: String,

    /// Answer snapshot requests with `status: NG`
    #[arg(long)]
    fail: bool,

    /// Relay control endpoint to register with after binding
    #[arg(long, env = "CAMERA_RELAY_URL")]
    relay: Option<String>,

    /// Path the relay should call for snapshots
    #[arg(long, default_value = "/")]
    path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(LogFormat::Text)?;
    let opts = Opts::parse();

    let listener = TcpListener::bind(opts.listen).await?;
    let port = listener.local_addr()?.port();
    tracing::info!("mock-camera listening on {}", listener.local_addr()?);

    if let Some(relay) = opts.relay.clone() {
        let path = opts.path.clone();
        tokio::spawn(async move {
            let client = ControlClient::new(reqwest::Client::new(), relay);
            let webhook = SetWebhookRequest {
                url: None,
                port: Some(PortValue::Number(port)),
                path: Some(path),
            };
            if let Err(err) = client.set_webhook(webhook).await {
                tracing::error!(error = %err, "self-registration failed");
            }
        });
    }

    axum::serve(listener, app(Arc::new(opts)))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

fn app(opts: Arc<Opts>) -> Router {
    let snapshot_path = if opts.path.starts_with('/') {
        opts.path.clone()
    } else {
        format!("/{}", opts.path)
    };
    let mut router = Router::new().route("/test", get(test));
    if snapshot_path != "/test" {
        router = router.route(&snapshot_path, get(snapshot));
    }
    router.with_state(opts)
}

async fn test() -> &'static str {
    tracing::info!("test call");
    "Test OK"
}

async fn snapshot(State(opts): State<Arc<Opts>>) -> Json<Value> {
    tracing::info!("snapshot call");
    if opts.fail {
        return Json(json!({
            "status": "NG",
            "message": "camera capture failed"
        }));
    }
    Json(json!({
        "status": "OK",
        "original": opts.original,
        "preview": opts.preview,
    }))
}
