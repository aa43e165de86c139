//! OAuth 2.0 types and structures
//!
//! Defines the token pair held for the current session, the wire format of
//! the Monzo token endpoint, and the client configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Access and refresh tokens for the current upstream session
///
/// Owned exclusively by the token manager. The access token and user id are
/// session-scoped and held only in memory; the refresh token is the single
/// value that ever reaches the credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Bearer token attached to every authenticated API call
    pub access_token: String,

    /// Credential used to obtain the next access token.
    /// Monzo rotates this on every refresh, so the newest value must always
    /// be persisted.
    pub refresh_token: String,

    /// Upstream user id returned alongside the tokens
    pub user_id: String,
}

/// Token response from the upstream token endpoint
///
/// Standard OAuth 2.0 token response format (RFC 6749) as returned by
/// `POST /oauth2/token` for both the `authorization_code` and
/// `refresh_token` grants.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
}

impl From<TokenResponse> for TokenPair {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user_id: response.user_id,
        }
    }
}

/// OAuth configuration for the Monzo authorization and API endpoints
///
/// Endpoint roots are full URLs rather than bare domains so tests can point
/// the client at a local mock server.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Authorization endpoint root (e.g. "https://auth.monzo.com")
    pub auth_endpoint: String,

    /// API endpoint root (e.g. "https://api.monzo.com"); the token endpoint
    /// lives under this root
    pub api_endpoint: String,

    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret (confidential client)
    pub client_secret: String,

    /// Redirect URI registered with the upstream client
    pub redirect_uri: String,
}

impl OAuthConfig {
    /// Create a new OAuth configuration
    #[must_use]
    pub fn new(
        auth_endpoint: String,
        api_endpoint: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self { auth_endpoint, api_endpoint, client_id, client_secret, redirect_uri }
    }

    /// Get the token URL (`{api_endpoint}/oauth2/token`)
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api_endpoint)
    }
}

/// OAuth error response from the authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    #[test]
    fn test_token_response_conversion() {
        let response = TokenResponse {
            access_token: "access123".to_string(),
            refresh_token: "refresh456".to_string(),
            user_id: "user_789".to_string(),
        };

        let pair: TokenPair = response.into();

        assert_eq!(pair.access_token, "access123");
        assert_eq!(pair.refresh_token, "refresh456");
        assert_eq!(pair.user_id, "user_789");
    }

    #[test]
    fn test_token_response_deserializes_wire_format() {
        let body = r#"{
            "access_token": "at",
            "refresh_token": "rt",
            "user_id": "user_1",
            "token_type": "Bearer",
            "expires_in": 21600
        }"#;

        let response: TokenResponse =
            serde_json::from_str(body).expect("token response should parse");
        assert_eq!(response.access_token, "at");
        assert_eq!(response.user_id, "user_1");
    }

    #[test]
    fn test_oauth_config_token_url() {
        let config = OAuthConfig::new(
            "https://auth.monzo.com".to_string(),
            "https://api.monzo.com".to_string(),
            "client123".to_string(),
            "secret".to_string(),
            "http://localhost:3000/callback".to_string(),
        );

        assert_eq!(config.token_url(), "https://api.monzo.com/oauth2/token");
    }

    #[test]
    fn test_oauth_error_display() {
        let error = OAuthError {
            error: "invalid_grant".to_string(),
            error_description: Some("The refresh token is invalid".to_string()),
        };

        let error_string = error.to_string();
        assert!(error_string.contains("invalid_grant"));
        assert!(error_string.contains("refresh token is invalid"));
    }

    #[test]
    fn test_oauth_error_without_description() {
        let error = OAuthError { error: "invalid_request".to_string(), error_description: None };

        assert_eq!(error.to_string(), "invalid_request");
    }
}
