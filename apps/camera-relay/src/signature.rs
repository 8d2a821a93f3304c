//! LINE webhook signature: base64(HMAC-SHA256(channel_secret, raw body)).

use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

type HmacSha256 = Hmac<Sha256>;

/// Signature the platform is expected to send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    B64.encode(mac.finalize().into_bytes())
}

/// Exact comparison of the provided header value against the computed one.
pub fn verify(secret: &str, body: &[u8], provided: &str) -> bool {
    if provided.is_empty() {
        return false;
    }
    let expected = sign(secret, body);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

pub fn provided_signature(headers: &HeaderMap) -> &str {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
