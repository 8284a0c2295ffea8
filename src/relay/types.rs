//! Per-request relay data.

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

use crate::relay::error::RelayError;

/// A validated outbound fetch.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub target_url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    /// Build a request, rejecting missing or non-http(s) targets.
    pub fn new(
        target: Option<&str>,
        method: Method,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Self, RelayError> {
        let target_url = parse_target(target)?;
        // GET and HEAD never carry a body upstream.
        let body = if method == Method::GET || method == Method::HEAD {
            None
        } else {
            body
        };
        Ok(Self {
            target_url,
            method,
            headers,
            body,
        })
    }
}

/// Parse the `url` parameter into an absolute http(s) URL.
pub fn parse_target(target: Option<&str>) -> Result<Url, RelayError> {
    let raw = target
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RelayError::InvalidRequest("Missing url parameter".to_string()))?;

    let url = Url::parse(raw)
        .map_err(|e| RelayError::InvalidRequest(format!("Invalid url '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(RelayError::InvalidRequest(format!(
            "Unsupported url '{}': only absolute http(s) URLs can be proxied",
            raw
        ))),
    }
}

/// What came back from upstream.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    /// Raw upstream headers; filtering happens when the response is shaped.
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Upstream `content-type`, empty when absent.
    pub declared_content_type: String,
    /// URL of the final response after redirects.
    pub final_url: Url,
}

/// JSON envelope accepted by `POST /proxy` and by other methods when `url`
/// is not in the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyEnvelope {
    pub url: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
}

impl ProxyEnvelope {
    /// Upstream method; defaults to `GET`.
    pub fn method(&self) -> Result<Method, RelayError> {
        match self.method.as_deref().map(str::trim) {
            None | Some("") => Ok(Method::GET),
            Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| RelayError::InvalidRequest(format!("Invalid method '{}'", m))),
        }
    }

    /// Upstream body: the JSON serialization of `body`. Falsy values
    /// (`null`, `false`, `0`, `""`) send no body at all.
    pub fn body_bytes(&self) -> Option<Bytes> {
        let body = self.body.as_ref().filter(|v| is_truthy(v))?;
        Some(Bytes::from(body.to_string()))
    }

    /// True when a serialized JSON body will be sent.
    pub fn body_is_json(&self) -> bool {
        self.body.as_ref().is_some_and(is_truthy)
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_target() {
        assert!(parse_target(Some("https://example.com/a")).is_ok());
        assert!(parse_target(Some("  http://example.com  ")).is_ok());

        for bad in [None, Some(""), Some("   "), Some("example.com"), Some("/relative"), Some("ftp://x.com/"), Some("file:///etc/passwd")] {
            assert!(
                matches!(parse_target(bad), Err(RelayError::InvalidRequest(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_get_and_head_drop_body() {
        let body = Some(Bytes::from_static(b"x"));
        let get = ProxyRequest::new(Some("https://a.io"), Method::GET, HeaderMap::new(), body.clone()).unwrap();
        assert!(get.body.is_none());
        let head = ProxyRequest::new(Some("https://a.io"), Method::HEAD, HeaderMap::new(), body.clone()).unwrap();
        assert!(head.body.is_none());
        let post = ProxyRequest::new(Some("https://a.io"), Method::POST, HeaderMap::new(), body).unwrap();
        assert_eq!(post.body.unwrap(), "x");
    }

    #[test]
    fn test_envelope_defaults() {
        let env: ProxyEnvelope = serde_json::from_value(json!({"url": "https://a.io"})).unwrap();
        assert_eq!(env.method().unwrap(), Method::GET);
        assert!(env.headers.is_empty());
        assert!(env.body_bytes().is_none());
    }

    #[test]
    fn test_envelope_method_and_body() {
        let env: ProxyEnvelope = serde_json::from_value(json!({
            "url": "https://a.io",
            "method": "patch",
            "headers": {"X-Token": "t"},
            "body": {"a": 1}
        }))
        .unwrap();
        assert_eq!(env.method().unwrap(), Method::PATCH);
        assert_eq!(env.body_bytes().unwrap(), r#"{"a":1}"#);
        assert!(env.body_is_json());

        let env: ProxyEnvelope =
            serde_json::from_value(json!({"url": "https://a.io", "body": "raw text"})).unwrap();
        assert_eq!(env.body_bytes().unwrap(), r#""raw text""#);
        assert!(env.body_is_json());
    }

    #[test]
    fn test_envelope_falsy_body_is_not_sent() {
        for body in [json!(null), json!(false), json!(0), json!(""), json!(0.0)] {
            let env: ProxyEnvelope =
                serde_json::from_value(json!({"url": "https://a.io", "body": body.clone()})).unwrap();
            assert!(env.body_bytes().is_none(), "{body} should send nothing");
            assert!(!env.body_is_json());
        }

        let env: ProxyEnvelope =
            serde_json::from_value(json!({"url": "https://a.io", "body": []})).unwrap();
        assert_eq!(env.body_bytes().unwrap(), "[]");
    }

    #[test]
    fn test_envelope_rejects_bad_method() {
        let env = ProxyEnvelope {
            method: Some("NOT A METHOD".into()),
            ..Default::default()
        };
        assert!(env.method().is_err());
    }
}
