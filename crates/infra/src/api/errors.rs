//! API-specific error types
//!
//! Maps upstream failures onto the taxonomy consumed by callers. Nothing in
//! this crate swallows an error: every non-success outcome surfaces as one
//! of these variants.

use thiserror::Error;

/// API operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// No session is established; the authorization flow must run first
    #[error("Authentication required: {0}")]
    Auth(String),

    /// The refresh token was rejected upstream; the session is terminal
    /// and re-authorization is required
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// A request still received 401/403 after its single refresh-and-retry
    /// cycle; access has been revoked upstream
    #[error("Unauthorized after token refresh: {0}")]
    Unauthorized(String),

    /// Any other non-success upstream response; never retried automatically
    #[error("Upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Transport-level failure; never retried automatically
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be deserialized
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Client misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// True for errors whose only remedy is restarting the authorization
    /// flow
    #[must_use]
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, Self::RefreshFailed(_) | Self::Unauthorized(_))
    }
}
