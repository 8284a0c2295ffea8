//! Relay error definitions.

use thiserror::Error;

/// Errors that abort a single relayed request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Required `url` absent or unusable; no fetch was attempted.
    #[error("{0}")]
    InvalidRequest(String),

    /// DNS, connect, TLS, timeout, redirect or body-read failure.
    #[error("Failed to fetch from target URL")]
    UpstreamUnreachable(#[source] reqwest::Error),
}

impl RelayError {
    /// Underlying cause chain, joined with `": "`.
    pub fn details(&self) -> Option<String> {
        match self {
            RelayError::InvalidRequest(_) => None,
            RelayError::UpstreamUnreachable(e) => {
                let mut text = e.to_string();
                let mut source = std::error::Error::source(e);
                while let Some(cause) = source {
                    text.push_str(": ");
                    text.push_str(&cause.to_string());
                    source = cause.source();
                }
                Some(text)
            }
        }
    }

    /// Whether the upstream fetch hit the configured deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::UpstreamUnreachable(e) if e.is_timeout())
    }
}
