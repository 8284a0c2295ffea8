//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! handler input (query / JSON envelope / raw body)
//!     → types.rs (validate target, drop body on GET/HEAD)
//!     → headers.rs (inbound allow-list, default User-Agent)
//!     → client.rs (single upstream attempt, redirects followed)
//!     → ProxyResponse (status, raw headers, buffered body)
//!     → headers.rs (response allow-list) in the HTTP layer
//! ```
//!
//! # Design Decisions
//! - No retries: a failed fetch is reported once as UpstreamUnreachable
//! - One pooled client shared by all requests; no other shared state

pub mod client;
pub mod error;
pub mod headers;
pub mod types;

pub use client::Relay;
pub use error::RelayError;
pub use headers::ResponseHeaderPolicy;
pub use types::{ProxyEnvelope, ProxyRequest, ProxyResponse};
