use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use webhook_store::StoreError;

use crate::camera::CameraError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    BadRequest(&'static str),
    #[error("webhook probe to {url} failed")]
    ProbeFailure {
        url: String,
        #[source]
        source: CameraError,
    },
    #[error("no camera webhook registered")]
    NoWebhook,
    #[error("camera server not responding")]
    Camera(#[from] CameraError),
    #[error("webhook store unavailable")]
    Store(#[from] StoreError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::ProbeFailure { .. }
            | RelayError::NoWebhook
            | RelayError::Camera(_)
            | RelayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Control responses carry no body; the status code is the whole answer.
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
