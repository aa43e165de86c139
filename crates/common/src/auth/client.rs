//! OAuth 2.0 client for the Monzo authorization-code flow
//!
//! Handles browser-based authorization with a confidential client:
//! - Authorization URL building with a fresh state nonce
//! - Authorization code exchange
//! - Token refresh

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::debug;

use super::state::{generate_state, validate_state};
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, OAuthError, TokenPair, TokenResponse};

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed
    RequestFailed(reqwest::Error),

    /// Token endpoint rejected the exchange (non-2xx response)
    UpstreamAuth(OAuthError),

    /// State parameter mismatch (forged or stale callback)
    StateMismatch { expected: String, received: String },

    /// Callback arrived with no authorization attempt in flight
    NoPendingAuthorization,

    /// Failed to parse response
    Parse(String),
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::UpstreamAuth(e) => write!(f, "Token exchange rejected: {e}"),
            Self::StateMismatch { expected, received } => {
                write!(f, "State mismatch (CSRF): expected {expected}, received {received}")
            }
            Self::NoPendingAuthorization => write!(f, "No authorization attempt in flight"),
            Self::Parse(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// OAuth 2.0 client for the Monzo API
///
/// Implements the RFC 6749 authorization-code grant with a client secret.
/// At most one authorization attempt is live at a time: each call to
/// [`OAuthClient::build_authorization_url`] replaces the previous state
/// nonce, and the matching callback consumes it.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
    live_state: Arc<Mutex<Option<String>>>,
}

impl OAuthClient {
    /// Create a new OAuth client with the given configuration
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, client, live_state: Arc::new(Mutex::new(None)) }
    }

    /// Build the authorization URL for browser-based login
    ///
    /// Generates a fresh unpredictable state nonce, stores it as the single
    /// live authorization state, and returns the upstream authorization URL
    /// the user should be redirected to.
    ///
    /// # Returns
    /// Tuple of (authorization_url, state); the state must come back
    /// unchanged on the callback
    pub async fn build_authorization_url(&self) -> (String, String) {
        let state = generate_state();

        // Replace any previous attempt: only one nonce is live at a time
        *self.live_state.lock().await = Some(state.clone());

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("state", state.as_str()),
        ];

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let url = format!("{}/?{}", self.config.auth_endpoint, query_string);

        debug!("Built authorization URL");

        (url, state)
    }

    /// Exchange an authorization code for a token pair
    ///
    /// Called after the user completes browser authorization. Consumes the
    /// live state nonce (single use) and performs a one-shot token exchange;
    /// authorization codes are single-use upstream, so a failed exchange is
    /// never retried.
    ///
    /// # Arguments
    /// * `code` - Authorization code from the redirect callback
    /// * `received_state` - State parameter from the callback
    ///
    /// # Errors
    /// Returns error if:
    /// - No authorization attempt is in flight
    /// - State mismatch (forged callback)
    /// - The token endpoint rejects the exchange or the response fails to
    ///   parse
    pub async fn exchange_code(
        &self,
        code: &str,
        received_state: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        // Consume the nonce regardless of outcome: it is single-use
        let expected = self
            .live_state
            .lock()
            .await
            .take()
            .ok_or(OAuthClientError::NoPendingAuthorization)?;

        if !validate_state(&expected, received_state) {
            return Err(OAuthClientError::StateMismatch {
                expected,
                received: received_state.to_string(),
            });
        }

        let request_body = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
        ];

        debug!(token_url = %self.config.token_url(), "Exchanging authorization code");

        let response = self.client.post(self.config.token_url()).form(&request_body).send().await?;

        Self::parse_token_response(response).await
    }

    /// Exchange a refresh token for a new token pair
    ///
    /// # Arguments
    /// * `refresh_token` - Refresh token from the previous authorization or
    ///   refresh
    ///
    /// # Returns
    /// New [`TokenPair`]; the refresh token inside it supersedes the one
    /// passed in (Monzo rotates refresh tokens on every use)
    ///
    /// # Errors
    /// Returns error if the upstream call fails, typically because the
    /// refresh token has been revoked
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        let request_body = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];

        debug!(token_url = %self.config.token_url(), "Refreshing access token");

        let response = self.client.post(self.config.token_url()).form(&request_body).send().await?;

        Self::parse_token_response(response).await
    }

    /// Get a reference to the OAuth configuration
    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    async fn parse_token_response(
        response: reqwest::Response,
    ) -> Result<TokenPair, OAuthClientError> {
        if !response.status().is_success() {
            let error: OAuthError = response
                .json()
                .await
                .map_err(|e| OAuthClientError::Parse(e.to_string()))?;
            return Err(OAuthClientError::UpstreamAuth(error));
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| OAuthClientError::Parse(e.to_string()))?;

        Ok(token_response.into())
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    async fn build_authorization_url(&self) -> (String, String) {
        self.build_authorization_url().await
    }

    async fn exchange_code(
        &self,
        code: &str,
        received_state: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        self.exchange_code(code, received_state).await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        self.refresh_access_token(refresh_token).await
    }
}
