//! Rewriting CORS Proxy Library
//!
//! Fetches a caller-specified URL, strips cross-origin restrictions and, for
//! HTML and CSS, rewrites embedded resource references so follow-up requests
//! route back through `/proxy`.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod rewrite;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
