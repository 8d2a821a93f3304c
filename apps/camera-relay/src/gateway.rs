//! The relay's single inbound endpoint.
//!
//! A request body with `mode: "set_webhook"` or `mode: "unset_webhook"` is a
//! control message from a camera agent. Anything else is treated as a LINE
//! webhook delivery: the signature is checked and the first message event is
//! answered with a camera snapshot. Deliveries always get `200`, whatever
//! happens to the reply.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::{Bytes, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, warn};
use webhook_store::SharedWebhookStore;

use crate::camera::CameraServer;
use crate::error::RelayError;
use crate::line_api::LineApi;
use crate::reqid::{RequestId, with_request_id};
use crate::signature;
use crate::types::{ControlMode, EventEnvelope, ImageUrls, ReplyMessage, ReplyRequest, SetWebhookRequest};
use crate::webhook_url::resolve_webhook_url;

/// Sent instead of an image when the camera server cannot be reached.
pub const CAMERA_UNAVAILABLE_TEXT: &str = "カメラサーバーが応答しません";

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Transport-independent view of an inbound call.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub headers: HeaderMap,
    pub peer: Option<SocketAddr>,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    channel_secret: String,
    store: SharedWebhookStore,
    camera: Arc<dyn CameraServer>,
    line: Arc<dyn LineApi>,
}

impl Gateway {
    pub fn new(
        channel_secret: impl Into<String>,
        store: SharedWebhookStore,
        camera: Arc<dyn CameraServer>,
        line: Arc<dyn LineApi>,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                channel_secret: channel_secret.into(),
                store,
                camera,
                line,
            }),
        }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/", post(handle_inbound))
            .route("/webhook", post(handle_inbound))
            .route("/healthz", get(|| async { "ok" }))
            .layer(middleware::from_fn(with_request_id))
            .with_state(self)
    }

    pub async fn handle(&self, request: InboundRequest) -> Response {
        let control = serde_json::from_slice::<Value>(&request.body)
            .ok()
            .and_then(|body| ControlMode::from_body(&body).map(|mode| (mode, body)));

        match control {
            Some((ControlMode::SetWebhook, body)) => {
                match self.register(body, &request.headers, request.peer).await {
                    Ok(()) => StatusCode::OK.into_response(),
                    Err(err) => {
                        warn!(mode = "set_webhook", error = %err, "webhook registration failed");
                        err.into_response()
                    }
                }
            }
            Some((ControlMode::UnsetWebhook, _)) => match self.unregister().await {
                Ok(()) => StatusCode::OK.into_response(),
                Err(err) => {
                    error!(mode = "unset_webhook", error = %err, "webhook removal failed");
                    err.into_response()
                }
            },
            None => {
                self.relay(&request.headers, &request.body);
                StatusCode::OK.into_response()
            }
        }
    }

    /// Probes the camera server and, only if it answers, stores its URL.
    pub async fn register(
        &self,
        body: Value,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
    ) -> Result<(), RelayError> {
        let request: SetWebhookRequest = serde_json::from_value(body)
            .map_err(|_| RelayError::BadRequest("malformed set_webhook body"))?;
        let webhook_url = resolve_webhook_url(&request, headers, peer)?;
        info!(mode = "set_webhook", url = %webhook_url, "probing camera webhook");

        self.inner
            .camera
            .probe(&webhook_url)
            .await
            .map_err(|source| RelayError::ProbeFailure {
                url: webhook_url.clone(),
                source,
            })?;

        let previous = self.inner.store.set_url(&webhook_url).await?;
        info!(
            mode = "set_webhook",
            url = %webhook_url,
            previous = previous.as_ref().map(|r| r.url.as_str()).unwrap_or("none"),
            "camera webhook registered"
        );
        Ok(())
    }

    pub async fn unregister(&self) -> Result<(), RelayError> {
        match self.inner.store.clear().await? {
            Some(removed) => info!(mode = "unset_webhook", url = %removed.url, "camera webhook deleted"),
            None => info!(mode = "unset_webhook", "no camera webhook registered; nothing to delete"),
        }
        Ok(())
    }

    /// Verifies a LINE delivery and detaches the reply for its first message
    /// event. Returns the reply task, if one was started.
    pub fn relay(&self, headers: &HeaderMap, body: &[u8]) -> Option<JoinHandle<()>> {
        let provided = signature::provided_signature(headers);
        if !signature::verify(&self.inner.channel_secret, body, provided) {
            warn!(event = "line_webhook", "signature mismatch; delivery dropped");
            return None;
        }

        let envelope: EventEnvelope = match serde_json::from_slice(body) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(event = "line_webhook", error = %err, "undecodable delivery dropped");
                return None;
            }
        };

        let event = envelope.first_message()?;
        let Some(reply_token) = event.reply_token else {
            warn!(event = "line_webhook", "message event without reply token");
            return None;
        };

        let gateway = self.clone();
        let span = tracing::info_span!("relay.reply", reply_token = %reply_token);
        Some(tokio::spawn(
            async move { gateway.reply(&reply_token).await }.instrument(span),
        ))
    }

    /// Answers `reply_token` with a camera snapshot, or with
    /// [`CAMERA_UNAVAILABLE_TEXT`] when none can be obtained.
    pub async fn reply(&self, reply_token: &str) {
        let message = match self.snapshot().await {
            Ok(urls) => {
                info!(original = %urls.original, preview = %urls.preview, "camera snapshot ready");
                ReplyMessage::image(urls)
            }
            Err(err) => {
                warn!(error = %err, cause = ?std::error::Error::source(&err), "camera server not responding");
                ReplyMessage::text(CAMERA_UNAVAILABLE_TEXT)
            }
        };

        let request = ReplyRequest::new(reply_token, message);
        match self.inner.line.reply(&request).await {
            Ok(()) => info!(reply_token, "reply sent"),
            Err(err) => error!(reply_token, error = %err, "reply failed"),
        }
    }

    async fn snapshot(&self) -> Result<ImageUrls, RelayError> {
        let record = self
            .inner
            .store
            .current()
            .await?
            .ok_or(RelayError::NoWebhook)?;
        Ok(self.inner.camera.fetch_image_urls(&record.url).await?)
    }
}

async fn handle_inbound(State(gateway): State<Gateway>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let request_id = parts
        .extensions
        .get::<RequestId>()
        .map(|RequestId(id)| id.clone())
        .unwrap_or_else(|| "n/a".into());

    let span = tracing::info_span!("relay.handle", request_id = %request_id);
    gateway
        .handle(InboundRequest {
            headers: parts.headers,
            peer,
            body,
        })
        .instrument(span)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraError;
    use crate::line_api::LineApiError;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use serde_json::json;
    use std::sync::Mutex;
    use webhook_store::{InMemoryWebhookStore, WebhookStore};

    const SECRET: &str = "test-secret";

    #[derive(Default)]
    struct FakeCamera {
        probe_ok: bool,
        snapshot: Option<ImageUrls>,
        probed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CameraServer for FakeCamera {
        async fn probe(&self, webhook_url: &str) -> Result<(), CameraError> {
            self.probed.lock().unwrap().push(webhook_url.to_string());
            if self.probe_ok {
                Ok(())
            } else {
                Err(CameraError::MissingUrl("probe"))
            }
        }

        async fn fetch_image_urls(&self, _webhook_url: &str) -> Result<ImageUrls, CameraError> {
            self.snapshot
                .clone()
                .ok_or(CameraError::Reported("offline".into()))
        }
    }

    #[derive(Default)]
    struct RecordingLine {
        sent: Mutex<Vec<ReplyRequest>>,
    }

    #[async_trait]
    impl LineApi for RecordingLine {
        async fn reply(&self, request: &ReplyRequest) -> Result<(), LineApiError> {
            self.sent.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn gateway(camera: FakeCamera) -> (Gateway, Arc<InMemoryWebhookStore>, Arc<RecordingLine>) {
        let store = Arc::new(InMemoryWebhookStore::new());
        let line = Arc::new(RecordingLine::default());
        let gateway = Gateway::new(SECRET, store.clone(), Arc::new(camera), line.clone());
        (gateway, store, line)
    }

    fn signed(body: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            signature::SIGNATURE_HEADER,
            HeaderValue::from_str(&signature::sign(SECRET, body)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn register_stores_url_after_successful_probe() {
        let (gateway, store, _) = gateway(FakeCamera {
            probe_ok: true,
            ..Default::default()
        });
        gateway
            .register(json!({"mode": "set_webhook", "url": "http://cam/"}), &HeaderMap::new(), None)
            .await
            .unwrap();
        assert_eq!(store.current().await.unwrap().unwrap().url, "http://cam/");
    }

    #[tokio::test]
    async fn failed_probe_keeps_previous_record() {
        let (gateway, store, _) = gateway(FakeCamera::default());
        store.set_url("http://old/").await.unwrap();
        let err = gateway
            .register(json!({"url": "http://new/"}), &HeaderMap::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::ProbeFailure { .. }));
        assert_eq!(store.current().await.unwrap().unwrap().url, "http://old/");
    }

    #[tokio::test]
    async fn unregister_without_record_is_ok() {
        let (gateway, store, _) = gateway(FakeCamera::default());
        gateway.unregister().await.unwrap();
        assert!(store.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unsigned_delivery_starts_no_reply() {
        let (gateway, _, line) = gateway(FakeCamera::default());
        let body = br#"{"events":[{"type":"message","replyToken":"T1"}]}"#;
        assert!(gateway.relay(&HeaderMap::new(), body).is_none());
        let mut wrong = HeaderMap::new();
        wrong.insert(
            signature::SIGNATURE_HEADER,
            HeaderValue::from_static("bm90LWEtc2lnbmF0dXJl"),
        );
        assert!(gateway.relay(&wrong, body).is_none());
        assert!(line.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn mismatch_is_logged_without_leaking_secret() {
        let (gateway, _, _) = gateway(FakeCamera::default());
        let body = br#"{"events":[]}"#;
        assert!(gateway.relay(&HeaderMap::new(), body).is_none());
        assert!(logs_contain("signature mismatch"));
        assert!(!logs_contain(SECRET));
    }

    #[tokio::test]
    async fn reply_uses_snapshot_urls() {
        let (gateway, store, line) = gateway(FakeCamera {
            snapshot: Some(ImageUrls {
                original: "http://a/o.jpg".into(),
                preview: "http://a/p.jpg".into(),
            }),
            ..Default::default()
        });
        store.set_url("http://cam/").await.unwrap();

        let body = br#"{"events":[{"type":"message","replyToken":"T1"}]}"#;
        gateway.relay(&signed(body), body).unwrap().await.unwrap();

        let sent = line.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            ReplyRequest::new(
                "T1",
                ReplyMessage::Image {
                    original_content_url: "http://a/o.jpg".into(),
                    preview_image_url: "http://a/p.jpg".into(),
                }
            )
        );
    }

    #[tokio::test]
    async fn reply_without_record_sends_notice() {
        let (gateway, _, line) = gateway(FakeCamera::default());
        gateway.reply("T9").await;
        let sent = line.sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            [ReplyRequest::new("T9", ReplyMessage::text(CAMERA_UNAVAILABLE_TEXT))]
        );
    }

    #[tokio::test]
    async fn only_first_message_event_is_answered() {
        let (gateway, _, line) = gateway(FakeCamera::default());
        let body = br#"{"events":[{"type":"follow","replyToken":"F"},{"type":"message","replyToken":"T1"},{"type":"message","replyToken":"T2"}]}"#;
        gateway.relay(&signed(body), body).unwrap().await.unwrap();
        let sent = line.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_token, "T1");
    }

    #[tokio::test]
    async fn event_without_type_does_not_drop_batch() {
        let (gateway, _, line) = gateway(FakeCamera::default());
        let body = br#"{"events":[{"foo":1},{"type":"message","replyToken":"T1"}]}"#;
        gateway.relay(&signed(body), body).unwrap().await.unwrap();
        let sent = line.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_token, "T1");
    }

    #[tokio::test]
    async fn explicit_url_ignores_unusable_port() {
        let (gateway, store, _) = gateway(FakeCamera {
            probe_ok: true,
            ..Default::default()
        });
        gateway
            .register(
                json!({"mode": "set_webhook", "url": "http://cam/", "port": 70000}),
                &HeaderMap::new(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(store.current().await.unwrap().unwrap().url, "http://cam/");

        let err = gateway
            .register(
                json!({"mode": "set_webhook", "port": 70000, "path": "/"}),
                &HeaderMap::new(),
                Some("192.0.2.5:40000".parse().unwrap()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn batch_without_message_event_starts_no_reply() {
        let (gateway, _, _) = gateway(FakeCamera::default());
        let body = br#"{"events":[{"type":"follow","replyToken":"F"}]}"#;
        assert!(gateway.relay(&signed(body), body).is_none());
        let empty = br#"{"events":[]}"#;
        assert!(gateway.relay(&signed(empty), empty).is_none());
    }
}
