//! Access-token seam between the request executor and the OAuth core
//!
//! The executor never holds tokens itself; it asks an [`AccessTokenProvider`]
//! for the current bearer token before each attempt and delegates refreshes
//! to it. The blanket implementation for
//! [`TokenManager`](ledgerlink_common::auth::TokenManager) is the production
//! wiring; tests substitute in-memory providers.

use async_trait::async_trait;
use ledgerlink_common::auth::{CredentialStore, TokenManager, TokenManagerError};
use ledgerlink_common::auth::OAuthClientTrait;

use super::errors::ApiError;

/// Source of bearer tokens for authenticated requests
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Current access token, if a session is established
    ///
    /// # Errors
    /// Returns [`ApiError::Auth`] when no session exists
    async fn access_token(&self) -> Result<String, ApiError>;

    /// Exchange the refresh token for a new token pair
    ///
    /// Called by the executor after a 401/403 response. Implementations
    /// must serialize concurrent refreshes themselves.
    ///
    /// # Errors
    /// Returns [`ApiError::RefreshFailed`] when the upstream rejects the
    /// refresh token
    async fn refresh(&self) -> Result<(), ApiError>;
}

#[async_trait]
impl<C, S> AccessTokenProvider for TokenManager<C, S>
where
    C: OAuthClientTrait + 'static,
    S: CredentialStore + 'static,
{
    async fn access_token(&self) -> Result<String, ApiError> {
        self.current_access_token()
            .await
            .map_err(|e| ApiError::Auth(e.to_string()))
    }

    async fn refresh(&self) -> Result<(), ApiError> {
        TokenManager::refresh(self).await.map_err(|e| match e {
            TokenManagerError::RefreshFailed(inner) => ApiError::RefreshFailed(inner.to_string()),
            other => ApiError::Auth(other.to_string()),
        })
    }
}
