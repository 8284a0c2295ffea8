//! Permissive CORS policy.
//!
//! Every response reflects the caller's `Origin` and allows credentials,
//! whatever the target. Upstream `access-control-*` headers are stripped by
//! the relay before this layer adds its own.

use axum::http::HeaderName;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Upstream headers a browser script may read from a relayed response.
const EXPOSED_HEADERS: &[&str] = &[
    "content-type",
    "cache-control",
    "expires",
    "last-modified",
    "etag",
    "x-request-id",
];

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers(
            EXPOSED_HEADERS
                .iter()
                .copied()
                .map(HeaderName::from_static)
                .collect::<Vec<_>>(),
        )
}
