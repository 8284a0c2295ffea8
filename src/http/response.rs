//! Response handling and transformation.
//!
//! # Responsibilities
//! - Shape relayed upstream responses for the client
//! - Map relay errors to the JSON error body
//!
//! # Design Decisions
//! - Upstream status is copied verbatim
//! - `content-length` is never copied; the body may have been rewritten
//! - Upstream CORS headers are dropped; the CORS layer adds our own

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use crate::relay::headers::filter_response_headers;
use crate::relay::{ProxyResponse, RelayError, ResponseHeaderPolicy};

/// JSON error body: `{ error, details? }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamUnreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the client response from an upstream response and the (possibly
/// rewritten) body.
pub fn relayed_response(upstream: &ProxyResponse, body: Bytes, policy: ResponseHeaderPolicy) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = filter_response_headers(&upstream.headers, policy);
    response
}
