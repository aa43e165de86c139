//! Authenticated Monzo API client
//!
//! Every request goes through [`ApiClient::execute`], which attaches the
//! current bearer token and runs the bounded refresh-and-retry cycle:
//! a 401/403 response triggers exactly one token refresh followed by one
//! retry of the same request. Any further rejection, and every other
//! failure class, surfaces to the caller without another attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::auth::AccessTokenProvider;
use super::errors::ApiError;
use super::transactions::{Transaction, TransactionPageSource};

const DEFAULT_BASE_URL: &str = "https://api.monzo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL of the REST API, without a trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ApiClientConfig {
    /// Configuration pointed at a non-default base URL
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }
}

/// A bank account visible to the authorized user
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<Account>,
}

/// Identity probe response from `/ping/whoami`
#[derive(Debug, Clone, Deserialize)]
pub struct WhoAmI {
    pub authenticated: bool,
    pub client_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<Transaction>,
}

/// Authenticated client for the Monzo REST API
///
/// Holds no token state of its own; bearer tokens come from the
/// [`AccessTokenProvider`] on every attempt, so a refresh completed by any
/// caller is picked up by all of them.
pub struct ApiClient {
    http: reqwest::Client,
    auth: Arc<dyn AccessTokenProvider>,
    config: ApiClientConfig,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Arguments
    /// * `config` - Base URL and timeout settings
    /// * `auth` - Provider of bearer tokens and refreshes
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the HTTP client cannot be built
    pub fn new(config: ApiClientConfig, auth: Arc<dyn AccessTokenProvider>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self { http, auth, config })
    }

    /// Execute an authenticated request with the bounded retry cycle
    ///
    /// # Errors
    /// * [`ApiError::Auth`] - no session established
    /// * [`ApiError::RefreshFailed`] - the post-401 refresh was rejected
    /// * [`ApiError::Unauthorized`] - 401/403 persisted after the refresh
    /// * [`ApiError::Upstream`] - any other non-success status
    /// * [`ApiError::Network`] - transport failure
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut refreshed = false;

        loop {
            let token = self.auth.access_token().await?;

            let response = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                debug!(%status, path, "Request succeeded");
                return Ok(response);
            }

            let rejected = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
            if rejected && !refreshed {
                warn!(%status, path, "Authorization rejected; refreshing token and retrying");
                self.auth.refresh().await?;
                refreshed = true;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            if rejected {
                warn!(%status, path, "Authorization rejected after refresh");
                return Err(ApiError::Unauthorized(message));
            }

            return Err(ApiError::Upstream { status: status.as_u16(), message });
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self.execute(Method::GET, path, query).await?;
        response.json::<T>().await.map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// List all accounts visible to the authorized user
    ///
    /// # Errors
    /// Propagates executor errors; see [`ApiClient::execute`]
    pub async fn accounts(&self) -> Result<Vec<Account>, ApiError> {
        let envelope: AccountsResponse = self.get("/accounts", &[]).await?;
        Ok(envelope.accounts)
    }

    /// First open account, the default target for history retrieval
    ///
    /// # Errors
    /// Propagates executor errors; see [`ApiClient::execute`]
    pub async fn primary_account(&self) -> Result<Option<Account>, ApiError> {
        let accounts = self.accounts().await?;
        Ok(accounts.into_iter().find(|account| !account.closed))
    }

    /// Identity probe, useful as a session health check
    ///
    /// # Errors
    /// Propagates executor errors; see [`ApiClient::execute`]
    pub async fn whoami(&self) -> Result<WhoAmI, ApiError> {
        self.get("/ping/whoami", &[]).await
    }
}

#[async_trait]
impl TransactionPageSource for ApiClient {
    async fn fetch_page(
        &self,
        account_id: &str,
        since: &str,
        before: &str,
        limit: u32,
    ) -> Result<Vec<Transaction>, ApiError> {
        let query = [
            ("account_id", account_id.to_string()),
            ("since", since.to_string()),
            ("before", before.to_string()),
            ("limit", limit.to_string()),
            ("expand[]", "merchant".to_string()),
        ];

        let envelope: TransactionsResponse = self.get("/transactions", &query).await?;
        Ok(envelope.transactions)
    }
}
