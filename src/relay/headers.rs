//! Header allow-lists for the relay.
//!
//! # Responsibilities
//! - Pick which inbound headers travel upstream
//! - Pick which upstream headers travel back to the caller
//! - Never echo upstream CORS headers or a stale `content-length`

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Inbound headers copied from a browser request.
pub const FORWARDED_REQUEST_HEADERS: &[&str] = &[
    "accept",
    "accept-language",
    "referer",
    "cookie",
    "authorization",
    "x-requested-with",
    "user-agent",
];

/// Headers never sent upstream, even when the caller names them explicitly.
pub const BLOCKED_REQUEST_HEADERS: &[&str] = &["host", "connection", "origin", "content-length"];

/// Upstream headers returned for `GET /proxy`.
pub const FORWARDED_RESPONSE_HEADERS: &[&str] = &[
    "content-type",
    "cache-control",
    "expires",
    "last-modified",
    "etag",
    "set-cookie",
];

/// Connection-scoped headers that never cross the proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// How upstream response headers are filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHeaderPolicy {
    /// Only [`FORWARDED_RESPONSE_HEADERS`].
    AllowList,
    /// Everything except CORS, `content-length` and hop-by-hop headers.
    AllExceptExcluded,
}

fn is_excluded_response_header(name: &str) -> bool {
    name.starts_with("access-control-") || name == "content-length" || HOP_BY_HOP.contains(&name)
}

/// Outbound headers built from a browser request, with a default User-Agent.
pub fn outbound_from_inbound(inbound: &HeaderMap, default_user_agent: &str) -> HeaderMap {
    let mut out = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS {
        if let Some(value) = inbound.get(*name) {
            out.insert(HeaderName::from_static(*name), value.clone());
        }
    }
    ensure_user_agent(&mut out, default_user_agent);
    out
}

/// Outbound headers from an explicit caller-supplied mapping (JSON envelope).
///
/// Names or values that are not valid HTTP are dropped.
pub fn outbound_from_explicit<'a, I>(headers: I, default_user_agent: &str) -> HeaderMap
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        let Ok(name) = HeaderName::from_bytes(name.trim().as_bytes()) else {
            tracing::debug!(header = name, "dropping invalid header name");
            continue;
        };
        if BLOCKED_REQUEST_HEADERS.contains(&name.as_str()) || HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                out.insert(name, value);
            }
            Err(_) => tracing::debug!(header = %name, "dropping invalid header value"),
        }
    }
    ensure_user_agent(&mut out, default_user_agent);
    out
}

fn ensure_user_agent(headers: &mut HeaderMap, default_user_agent: &str) {
    if headers.contains_key(header::USER_AGENT) {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(default_user_agent) {
        headers.insert(header::USER_AGENT, value);
    }
}

/// Filter upstream response headers for the caller.
///
/// Under [`ResponseHeaderPolicy::AllowList`] the first value of each allowed
/// header wins.
pub fn filter_response_headers(upstream: &HeaderMap, policy: ResponseHeaderPolicy) -> HeaderMap {
    let mut out = HeaderMap::new();
    match policy {
        ResponseHeaderPolicy::AllowList => {
            for name in FORWARDED_RESPONSE_HEADERS {
                if let Some(value) = upstream.get(*name) {
                    out.insert(HeaderName::from_static(*name), value.clone());
                }
            }
        }
        ResponseHeaderPolicy::AllExceptExcluded => {
            for (name, value) in upstream {
                if !is_excluded_response_header(name.as_str()) {
                    out.append(name.clone(), value.clone());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "test-agent/1.0";

    fn map(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.append(HeaderName::from_static(*k), HeaderValue::from_static(*v));
        }
        h
    }

    #[test]
    fn test_inbound_allow_list() {
        let inbound = map(&[
            ("accept", "text/html"),
            ("cookie", "a=b"),
            ("host", "proxy.local"),
            ("origin", "https://app.local"),
            ("connection", "keep-alive"),
            ("x-custom", "1"),
        ]);
        let out = outbound_from_inbound(&inbound, UA);
        assert_eq!(out.get("accept").unwrap(), "text/html");
        assert_eq!(out.get("cookie").unwrap(), "a=b");
        assert_eq!(out.get("user-agent").unwrap(), UA);
        assert!(out.get("host").is_none());
        assert!(out.get("origin").is_none());
        assert!(out.get("connection").is_none());
        assert!(out.get("x-custom").is_none());
    }

    #[test]
    fn test_caller_user_agent_wins() {
        let out = outbound_from_inbound(&map(&[("user-agent", "curl/8")]), UA);
        assert_eq!(out.get("user-agent").unwrap(), "curl/8");
    }

    #[test]
    fn test_explicit_headers() {
        let out = outbound_from_explicit(
            [
                ("X-Api-Key", "k"),
                ("Host", "evil"),
                ("Origin", "x"),
                ("Transfer-Encoding", "chunked"),
                ("bad header", "v"),
                ("x-bad-value", "line\nbreak"),
            ],
            UA,
        );
        assert_eq!(out.get("x-api-key").unwrap(), "k");
        assert_eq!(out.get("user-agent").unwrap(), UA);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_response_allow_list() {
        let upstream = map(&[
            ("content-type", "text/html"),
            ("content-length", "42"),
            ("access-control-allow-origin", "*"),
            ("etag", "\"v1\""),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
            ("server", "nginx"),
        ]);
        let out = filter_response_headers(&upstream, ResponseHeaderPolicy::AllowList);
        assert_eq!(out.get("content-type").unwrap(), "text/html");
        assert_eq!(out.get("etag").unwrap(), "\"v1\"");
        assert_eq!(out.get_all("set-cookie").iter().count(), 1);
        assert_eq!(out.get("set-cookie").unwrap(), "a=1");
        assert!(out.get("content-length").is_none());
        assert!(out.get("access-control-allow-origin").is_none());
        assert!(out.get("server").is_none());
    }

    #[test]
    fn test_response_all_except_excluded() {
        let upstream = map(&[
            ("content-type", "application/json"),
            ("content-length", "42"),
            ("access-control-allow-credentials", "true"),
            ("access-control-expose-headers", "x"),
            ("transfer-encoding", "chunked"),
            ("x-upstream", "1"),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
        ]);
        let out = filter_response_headers(&upstream, ResponseHeaderPolicy::AllExceptExcluded);
        assert_eq!(out.get("x-upstream").unwrap(), "1");
        assert_eq!(out.get_all("set-cookie").iter().count(), 2);
        assert!(out.keys().all(|k| !k.as_str().starts_with("access-control-")));
        assert!(out.get("content-length").is_none());
        assert!(out.get("transfer-encoding").is_none());
    }
}
