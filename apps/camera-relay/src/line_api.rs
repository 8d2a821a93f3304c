use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::types::ReplyRequest;

pub const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";

#[derive(Debug, thiserror::Error)]
pub enum LineApiError {
    #[error("line reply request failed")]
    Request(#[from] reqwest::Error),
    #[error("line reply rejected with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Outbound half of the LINE Messaging API.
#[async_trait]
pub trait LineApi: Send + Sync {
    async fn reply(&self, request: &ReplyRequest) -> Result<(), LineApiError>;
}

#[derive(Clone)]
pub struct HttpLineApi {
    client: Client,
    api_base: String,
    channel_token: String,
}

impl HttpLineApi {
    pub fn new(client: Client, api_base: Option<String>, channel_token: impl Into<String>) -> Self {
        let api_base = api_base.unwrap_or_else(|| DEFAULT_LINE_API_BASE.into());
        Self {
            client,
            api_base,
            channel_token: channel_token.into(),
        }
    }

    fn reply_url(&self) -> String {
        format!(
            "{}/v2/bot/message/reply",
            self.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LineApi for HttpLineApi {
    async fn reply(&self, request: &ReplyRequest) -> Result<(), LineApiError> {
        let res = self
            .client
            .post(self.reply_url())
            .bearer_auth(&self.channel_token)
            .json(request)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LineApiError::Rejected { status, body });
        }
        Ok(())
    }
}
