//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, proxy origin)
//!     → handlers.rs (route dispatch, relay, rewrite)
//!     → response.rs (status copy, header filtering, error body)
//!     → cors.rs (reflected-origin CORS headers)
//!     → Send to client
//! ```

pub mod cors;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
