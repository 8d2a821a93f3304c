use axum::{
    body::Body,
    http::{HeaderValue, Request, header::HeaderName},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_UPSTREAM_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Keeps an id set by a fronting proxy, otherwise mints a new one.
    fn for_request(req: &Request<Body>) -> Self {
        let upstream = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty() && id.len() <= MAX_UPSTREAM_ID_LEN);
        match upstream {
            Some(id) => Self(id.to_string()),
            None => Self(Uuid::new_v4().to_string()),
        }
    }
}

/// Tags every inbound request with an id, visible to handlers as a
/// [`RequestId`] extension and echoed back in `x-request-id`.
pub async fn with_request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = RequestId::for_request(&req);
    let echoed = HeaderValue::from_str(&id.0);
    req.extensions_mut().insert(id);

    let mut res = next.run(req).await;
    if let Ok(value) = echoed {
        res.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    res
}
