//! Camera agent side of the control protocol: tells a relay where to reach
//! the camera server, or that it has gone away.

use anyhow::{Context, Result, anyhow};
use reqwest::Client;

use crate::types::{ControlRequest, SetWebhookRequest};

#[derive(Clone)]
pub struct ControlClient {
    client: Client,
    relay_url: String,
}

impl ControlClient {
    pub fn new(client: Client, relay_url: impl Into<String>) -> Self {
        Self {
            client,
            relay_url: relay_url.into(),
        }
    }

    pub async fn set_webhook(&self, webhook: SetWebhookRequest) -> Result<()> {
        self.send(&ControlRequest::set_webhook(webhook)).await
    }

    pub async fn unset_webhook(&self) -> Result<()> {
        self.send(&ControlRequest::unset_webhook()).await
    }

    async fn send(&self, body: &ControlRequest) -> Result<()> {
        let mode = body.mode.as_str();
        let res = self
            .client
            .post(&self.relay_url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("relay {mode} request"))?;
        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("relay rejected {mode} with {status}"));
        }
        tracing::info!(mode, relay = %self.relay_url, "relay accepted control request");
        Ok(())
    }
}
