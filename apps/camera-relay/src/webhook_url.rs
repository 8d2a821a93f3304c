use std::net::SocketAddr;

use axum::http::HeaderMap;
use reqwest::Url;

use crate::error::RelayError;
use crate::types::SetWebhookRequest;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Joins `base` and `path` with exactly one `/` between them. An empty path
/// leaves the base untouched.
pub fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Liveness probe address for a webhook URL: `test` appended as the last
/// path segment, ahead of any query string.
pub fn probe_url(webhook_url: &str) -> String {
    let Ok(mut url) = Url::parse(webhook_url) else {
        return join_url(webhook_url, "/test");
    };
    let appended = url.path_segments_mut().map(|mut segments| {
        segments.pop_if_empty().push("test");
    });
    match appended {
        Ok(()) => url.to_string(),
        Err(()) => join_url(webhook_url, "/test"),
    }
}

/// First `X-Forwarded-For` entry, falling back to the TCP peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

/// URL to register: the explicit `url` when given, otherwise
/// `http://<client-ip>:<port>` joined with `path`.
pub fn resolve_webhook_url(
    request: &SetWebhookRequest,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> Result<String, RelayError> {
    if let Some(url) = request.url.as_deref() {
        return Ok(url.to_string());
    }
    let port = request
        .port
        .as_ref()
        .map(|p| p.as_string())
        .filter(|p| !p.is_empty())
        .ok_or(RelayError::BadRequest("a valid port is required when url is absent"))?;
    let path = request
        .path
        .as_deref()
        .ok_or(RelayError::BadRequest("path is required when url is absent"))?;
    let ip = client_ip(headers, peer)
        .ok_or(RelayError::BadRequest("client address is unknown"))?;
    Ok(join_url(&format!("http://{ip}:{port}"), path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortValue;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn join_collapses_slashes() {
        assert_eq!(join_url("http://a:1", "/"), "http://a:1/");
        assert_eq!(join_url("http://a:1/", "/x"), "http://a:1/x");
        assert_eq!(join_url("http://a:1", "x/y"), "http://a:1/x/y");
        assert_eq!(join_url("http://a:1/", ""), "http://a:1/");
        assert_eq!(probe_url("http://a:1/"), "http://a:1/test");
        assert_eq!(probe_url("http://a:1/get_image"), "http://a:1/get_image/test");
        assert_eq!(probe_url("http://a:1/get_image/"), "http://a:1/get_image/test");
    }

    #[test]
    fn probe_keeps_query_after_path() {
        assert_eq!(
            probe_url("http://x/get_image?k=1"),
            "http://x/get_image/test?k=1"
        );
        assert_eq!(probe_url("http://x/?k=1"), "http://x/test?k=1");
    }

    #[test]
    fn client_ip_takes_first_forwarded_entry() {
        let headers = forwarded(" 203.0.113.7 , 10.0.0.1");
        assert_eq!(client_ip(&headers, None).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn client_ip_falls_back_to_peer() {
        let peer: SocketAddr = "192.0.2.5:51000".parse().unwrap();
        assert_eq!(
            client_ip(&HeaderMap::new(), Some(peer)).as_deref(),
            Some("192.0.2.5")
        );
        assert_eq!(client_ip(&forwarded(""), Some(peer)).as_deref(), Some("192.0.2.5"));
        assert!(client_ip(&HeaderMap::new(), None).is_none());
    }

    #[test]
    fn explicit_url_is_used_verbatim() {
        let request = SetWebhookRequest {
            url: Some("http://xxxx.com/".into()),
            port: Some(PortValue::Text("1".into())),
            path: Some("/ignored".into()),
        };
        let url = resolve_webhook_url(&request, &forwarded("1.2.3.4"), None).unwrap();
        assert_eq!(url, "http://xxxx.com/");
    }

    #[test]
    fn url_built_from_forwarded_ip_port_and_path() {
        let request = SetWebhookRequest {
            url: None,
            port: Some(PortValue::Text("8880".into())),
            path: Some("/get_image".into()),
        };
        let url = resolve_webhook_url(&request, &forwarded("198.51.100.4, 10.0.0.1"), None)
            .unwrap();
        assert_eq!(url, "http://198.51.100.4:8880/get_image");
    }

    #[test]
    fn missing_port_or_path_is_bad_request() {
        let headers = forwarded("1.2.3.4");
        let no_port = SetWebhookRequest {
            path: Some("/".into()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_webhook_url(&no_port, &headers, None),
            Err(RelayError::BadRequest(_))
        ));
        let no_path = SetWebhookRequest {
            port: Some(PortValue::Number(8089)),
            ..Default::default()
        };
        assert!(matches!(
            resolve_webhook_url(&no_path, &headers, None),
            Err(RelayError::BadRequest(_))
        ));
    }
}
