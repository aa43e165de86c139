//! OAuth 2.0 session management for the Monzo API
//!
//! Implements the authorization-code flow for a confidential client:
//! - Authorization URL building with an anti-CSRF state nonce
//! - Authorization code exchange (`grant_type=authorization_code`)
//! - Token refresh with rotation (`grant_type=refresh_token`)
//! - Refresh-token persistence via a file-backed credential store
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ TokenManager  │  Token lifecycle + single-flight refresh
//! └──────┬────────┘
//!        ├──► OAuthClient       (HTTP OAuth flows, state nonce)
//!        └──► CredentialStore   (refresh-token persistence)
//! ```
//!
//! Only the refresh token is ever persisted. The access token and user id
//! are session-scoped and live purely in memory.
//!
//! # Module Organization
//!
//! - **[`types`]**: Core OAuth types (`TokenPair`, `OAuthConfig`, `OAuthError`)
//! - **[`state`]**: Anti-CSRF state nonce generation and validation
//! - **[`client`]**: OAuth HTTP client for authorization and token exchange
//! - **[`store`]**: Credential persistence (`CredentialStore`,
//!   `FileCredentialStore`)
//! - **[`token_manager`]**: Token lifecycle with bootstrap and refresh
//! - **[`traits`]**: Injection seams for testing

pub mod client;
pub mod state;
pub mod store;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use client::{OAuthClient, OAuthClientError};
pub use state::{generate_state, validate_state};
pub use store::{CredentialStore, FileCredentialStore, StoreError};
pub use token_manager::{TokenManager, TokenManagerError};
pub use traits::OAuthClientTrait;
pub use types::{OAuthConfig, OAuthError, TokenPair, TokenResponse};
