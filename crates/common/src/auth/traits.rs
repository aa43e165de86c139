//! Traits for OAuth operations
//!
//! These traits enable dependency injection and testing by abstracting the
//! upstream OAuth server. The credential store seam lives in
//! [`super::store`].

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::types::TokenPair;

/// Trait for OAuth client operations
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Build the authorization URL for browser-based login
    ///
    /// # Returns
    /// Tuple of (authorization_url, state) where state must be validated in
    /// the callback
    async fn build_authorization_url(&self) -> (String, String);

    /// Exchange an authorization code for a token pair
    ///
    /// # Errors
    /// Returns error on state mismatch or when the token endpoint rejects
    /// the exchange
    async fn exchange_code(
        &self,
        code: &str,
        received_state: &str,
    ) -> Result<TokenPair, OAuthClientError>;

    /// Exchange a refresh token for a new token pair
    ///
    /// # Errors
    /// Returns error if the refresh token is rejected or the call fails
    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<TokenPair, OAuthClientError>;
}
