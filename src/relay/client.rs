//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Issue exactly one upstream request per client request
//! - Follow redirects transparently
//! - Bound connect and total time
//! - Buffer the upstream body for the rewriter

use std::time::{Duration, Instant};

use axum::http::header;
use reqwest::redirect::Policy;

use crate::config::RelayConfig;
use crate::observability::metrics;
use crate::relay::error::RelayError;
use crate::relay::types::{ProxyRequest, ProxyResponse};

/// Stateless relay over a pooled client.
#[derive(Clone)]
pub struct Relay {
    client: reqwest::Client,
    user_agent: String,
}

impl Relay {
    /// Build the relay and its connection pool from config.
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(RelayError::UpstreamUnreachable)?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    /// Default User-Agent for outbound requests.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetch `request.target_url` and buffer the response.
    pub async fn relay(&self, request: ProxyRequest) -> Result<ProxyResponse, RelayError> {
        let start = Instant::now();
        let ProxyRequest {
            target_url,
            method,
            headers,
            body,
        } = request;

        tracing::debug!(url = %target_url, method = %method, "Relaying request");

        let mut builder = self
            .client
            .request(method.clone(), target_url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(url = %target_url, error = %e, "Upstream request failed");
            metrics::record_upstream_error();
            RelayError::UpstreamUnreachable(e)
        })?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let declared_content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response.bytes().await.map_err(|e| {
            tracing::warn!(url = %target_url, error = %e, "Upstream body read failed");
            metrics::record_upstream_error();
            RelayError::UpstreamUnreachable(e)
        })?;

        tracing::debug!(
            url = %target_url,
            final_url = %final_url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        );

        Ok(ProxyResponse {
            status,
            headers,
            body,
            declared_content_type,
            final_url,
        })
    }
}
