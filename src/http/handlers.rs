//! Route handlers.
//!
//! | Route | Behavior |
//! |---|---|
//! | `GET /healthz` | liveness JSON |
//! | `GET /` | URL entry form |
//! | `GET /proxy?url=` | relay, rewrite HTML/CSS, allow-listed headers |
//! | `POST /proxy` | JSON envelope relay, no rewriting |
//! | other methods `/proxy` | raw relay, url from query or JSON envelope |

use std::time::Instant;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, Method},
    response::{Html, IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::http::request::{proxy_origin, request_id};
use crate::http::response::relayed_response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::relay::headers::{outbound_from_explicit, outbound_from_inbound};
use crate::relay::{ProxyEnvelope, ProxyRequest, ProxyResponse, RelayError, ResponseHeaderPolicy};
use crate::rewrite::{self, MediaType, RewriteContext};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8">
  <title>Rewrite Proxy</title>
  <style>
    body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 4rem auto; padding: 0 1rem; }
    form { display: flex; gap: .5rem; }
    input[type=url] { flex: 1; padding: .5rem; }
    button { padding: .5rem 1rem; }
  </style>
</head>
<body>
  <h1>Rewrite Proxy</h1>
  <form method="get" action="/proxy">
    <input type="url" name="url" placeholder="https://example.com/" required autofocus>
    <button type="submit">Go</button>
  </form>
  <p>Usage: <code>GET /proxy?url=&lt;encoded-url&gt;</code></p>
</body>
</html>
"#;

#[derive(Debug, Default, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// `GET /proxy?url=...` (and `HEAD`).
pub async fn proxy_get(
    State(state): State<AppState>,
    method: Method,
    query: Result<Query<ProxyQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers);
    let query = match query {
        Ok(Query(q)) => q,
        Err(e) => return reject(&request_id, &method, query_error(e), start),
    };

    let outbound = outbound_from_inbound(&headers, state.relay.user_agent());
    let request = match ProxyRequest::new(query.url.as_deref(), method.clone(), outbound, None) {
        Ok(r) => r,
        Err(e) => return reject(&request_id, &method, e, start),
    };

    let upstream = match relay(&state, request, &request_id).await {
        Ok(u) => u,
        Err(e) => return reject(&request_id, &method, e, start),
    };

    let body = if state.config.rewrite.enabled {
        let origin = proxy_origin(&headers, state.config.rewrite.public_origin.as_deref());
        rewrite_body(&upstream, origin, &request_id)
    } else {
        upstream.body.clone()
    };

    metrics::record_request(method.as_str(), upstream.status.as_u16(), start);
    relayed_response(&upstream, body, ResponseHeaderPolicy::AllowList)
}

/// `POST /proxy` with a JSON envelope.
pub async fn proxy_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers);

    let request = match envelope_request(&state, &body, None) {
        Ok(r) => r,
        Err(e) => return reject(&request_id, &Method::POST, e, start),
    };
    let method = request.method.clone();

    match relay(&state, request, &request_id).await {
        Ok(upstream) => {
            metrics::record_request(method.as_str(), upstream.status.as_u16(), start);
            relayed_response(&upstream, upstream.body.clone(), ResponseHeaderPolicy::AllExceptExcluded)
        }
        Err(e) => reject(&request_id, &method, e, start),
    }
}

/// Any other method on `/proxy`: raw relay.
pub async fn proxy_any(
    State(state): State<AppState>,
    method: Method,
    query: Result<Query<ProxyQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers);
    let query = match query {
        Ok(Query(q)) => q,
        Err(e) => return reject(&request_id, &method, query_error(e), start),
    };

    let request = match query.url.as_deref() {
        Some(url) => {
            let mut outbound = outbound_from_inbound(&headers, state.relay.user_agent());
            if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
                outbound.insert(header::CONTENT_TYPE, content_type.clone());
            }
            let body = (!body.is_empty()).then_some(body);
            ProxyRequest::new(Some(url), method.clone(), outbound, body)
        }
        None => envelope_request(&state, &body, Some(&method)),
    };
    let request = match request {
        Ok(r) => r,
        Err(e) => return reject(&request_id, &method, e, start),
    };

    match relay(&state, request, &request_id).await {
        Ok(upstream) => {
            metrics::record_request(method.as_str(), upstream.status.as_u16(), start);
            relayed_response(&upstream, upstream.body.clone(), ResponseHeaderPolicy::AllExceptExcluded)
        }
        Err(e) => reject(&request_id, &method, e, start),
    }
}

/// Parse a JSON envelope into an outbound request. `fallback_method` is used
/// when the envelope names none.
fn envelope_request(
    state: &AppState,
    body: &[u8],
    fallback_method: Option<&Method>,
) -> Result<ProxyRequest, RelayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RelayError::InvalidRequest("Missing url in request body".to_string()));
    }
    let envelope: ProxyEnvelope = serde_json::from_slice(body)
        .map_err(|e| RelayError::InvalidRequest(format!("Invalid JSON body: {}", e)))?;

    if envelope.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
        return Err(RelayError::InvalidRequest("Missing url in request body".to_string()));
    }

    let method = match (&envelope.method, fallback_method) {
        (None, Some(m)) => m.clone(),
        _ => envelope.method()?,
    };

    let mut headers = outbound_from_explicit(
        envelope.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        state.relay.user_agent(),
    );
    if envelope.body_is_json() && !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    ProxyRequest::new(envelope.url.as_deref(), method, headers, envelope.body_bytes())
}

fn query_error(rejection: QueryRejection) -> RelayError {
    RelayError::InvalidRequest(format!("Invalid query string: {}", rejection.body_text()))
}

async fn relay(state: &AppState, request: ProxyRequest, request_id: &str) -> Result<ProxyResponse, RelayError> {
    tracing::info!(
        request_id = %request_id,
        method = %request.method,
        url = %request.target_url,
        "Proxying request"
    );
    let upstream = state.relay.relay(request).await?;
    tracing::info!(
        request_id = %request_id,
        status = upstream.status.as_u16(),
        content_type = %upstream.declared_content_type,
        "Successfully proxied response"
    );
    Ok(upstream)
}

fn rewrite_body(upstream: &ProxyResponse, origin: String, request_id: &str) -> Bytes {
    let media_type = MediaType::from_content_type(&upstream.declared_content_type);
    if !media_type.is_rewritable() {
        return upstream.body.clone();
    }

    let ctx = RewriteContext::new(upstream.final_url.clone(), origin);
    let body = rewrite::rewrite_bytes(upstream.body.clone(), &upstream.declared_content_type, &ctx);
    tracing::debug!(
        request_id = %request_id,
        kind = media_type.as_str(),
        before = upstream.body.len(),
        after = body.len(),
        "Rewrote body"
    );
    metrics::record_rewrite(media_type.as_str());
    body
}

fn reject(request_id: &str, method: &Method, error: RelayError, start: Instant) -> Response {
    match &error {
        RelayError::InvalidRequest(msg) => {
            tracing::warn!(request_id = %request_id, error = %msg, "Rejected proxy request");
        }
        RelayError::UpstreamUnreachable(_) => {
            tracing::error!(
                request_id = %request_id,
                timeout = error.is_timeout(),
                details = %error.details().unwrap_or_default(),
                "Proxy error"
            );
        }
    }
    let response = error.into_response();
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}
