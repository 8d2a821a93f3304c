//! Wire types for the control protocol, the LINE webhook envelope, the
//! camera server response, and the LINE reply call.

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    SetWebhook,
    UnsetWebhook,
}

impl ControlMode {
    /// Reads `mode` from an already parsed body. Unknown or missing modes
    /// mean the body is a chat event envelope.
    pub fn from_body(body: &Value) -> Option<Self> {
        match body.get("mode").and_then(Value::as_str)? {
            "set_webhook" => Some(Self::SetWebhook),
            "unset_webhook" => Some(Self::UnsetWebhook),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetWebhook => "set_webhook",
            Self::UnsetWebhook => "unset_webhook",
        }
    }
}

/// Camera agents send the port either as a string or as a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    pub fn as_string(&self) -> String {
        match self {
            Self::Number(port) => port.to_string(),
            Self::Text(port) => port.trim().to_string(),
        }
    }
}

/// Fields that do not have the expected shape read as absent, so a stray
/// `port` never spoils a registration that carries an explicit `url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SetWebhookRequest {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub port: Option<PortValue>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Body sent by a camera agent to the relay's control endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRequest {
    pub mode: ControlMode,
    #[serde(flatten)]
    pub webhook: SetWebhookRequest,
}

impl ControlRequest {
    pub fn set_webhook(webhook: SetWebhookRequest) -> Self {
        Self {
            mode: ControlMode::SetWebhook,
            webhook,
        }
    }

    pub fn unset_webhook() -> Self {
        Self {
            mode: ControlMode::UnsetWebhook,
            webhook: SetWebhookRequest::default(),
        }
    }
}

/// Events stay raw until scanned; one odd event must not hide the rest of
/// the batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub events: Vec<Value>,
}

impl EventEnvelope {
    /// Only the first message event of a batch is answered.
    pub fn first_message(&self) -> Option<LineEvent> {
        self.events
            .iter()
            .map(LineEvent::from_value)
            .find(LineEvent::is_message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineEvent {
    pub r#type: Option<String>,
    pub reply_token: Option<String>,
}

impl LineEvent {
    pub fn from_value(event: &Value) -> Self {
        let text = |key: &str| event.get(key).and_then(Value::as_str).map(str::to_owned);
        Self {
            r#type: text("type"),
            reply_token: text("replyToken"),
        }
    }

    pub fn is_message(&self) -> bool {
        self.r#type.as_deref() == Some("message")
    }
}

/// Camera server response to `GET <webhook url>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CameraSnapshot {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrls {
    pub original: String,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplyMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        original_content_url: String,
        preview_image_url: String,
    },
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(urls: ImageUrls) -> Self {
        Self::Image {
            original_content_url: urls.original,
            preview_image_url: urls.preview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub reply_token: String,
    pub messages: Vec<ReplyMessage>,
}

impl ReplyRequest {
    pub fn new(reply_token: impl Into<String>, message: ReplyMessage) -> Self {
        Self {
            reply_token: reply_token.into(),
            messages: vec![message],
        }
    }
}
