//! Mock implementations of the auth traits
//!
//! Provides in-memory stand-ins for the upstream OAuth server and the
//! credential store so token lifecycle behavior can be tested
//! deterministically, without HTTP or a filesystem.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::{
    CredentialStore, OAuthClientError, OAuthClientTrait, OAuthError, StoreError, TokenPair,
};

/// In-memory credential store
///
/// Backed by a `Mutex<Option<String>>`; mirrors the single-slot semantics
/// of the file store (last write wins).
#[derive(Debug, Default)]
pub struct MockCredentialStore {
    token: Mutex<Option<String>>,
    save_count: AtomicUsize,
    fail_saves: bool,
    fail_loads: bool,
}

impl MockCredentialStore {
    /// Create an empty store (first-run state)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a refresh token
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        Self { token: Mutex::new(Some(token.to_string())), ..Self::default() }
    }

    /// Create a store whose writes always fail
    #[must_use]
    pub fn failing_saves() -> Self {
        Self { fail_saves: true, ..Self::default() }
    }

    /// Create a store whose reads always fail
    #[must_use]
    pub fn failing_loads() -> Self {
        Self { fail_loads: true, ..Self::default() }
    }

    /// Currently stored value, if any
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned (acceptable in test mocks)
    #[must_use]
    pub fn stored(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    /// Number of successful saves observed
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        if self.fail_loads {
            return Err(StoreError(std::io::Error::other("mock load failure")));
        }
        Ok(self.token.lock().unwrap().clone())
    }

    async fn save(&self, refresh_token: &str) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError(std::io::Error::other("mock save failure")));
        }
        *self.token.lock().unwrap() = Some(refresh_token.to_string());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Mock OAuth client that counts upstream calls
///
/// Each successful refresh or exchange yields a numbered token pair
/// (`access_1`/`refresh_1`, `access_2`/`refresh_2`, ...), emulating the
/// upstream's refresh-token rotation. An optional delay holds the simulated
/// upstream call open so overlapping-refresh behavior can be observed.
#[derive(Debug, Default)]
pub struct CountingOAuthClient {
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    issued: AtomicUsize,
    delay: Option<Duration>,
    fail_refresh: bool,
    last_refresh_token: Mutex<Option<String>>,
}

impl CountingOAuthClient {
    /// Create a mock client that succeeds immediately
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock client that holds each refresh open for `delay`
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::default() }
    }

    /// Create a mock client whose refreshes always fail
    #[must_use]
    pub fn failing_refresh() -> Self {
        Self { fail_refresh: true, ..Self::default() }
    }

    /// Number of refresh calls that reached the mock upstream
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of code exchanges that reached the mock upstream
    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    /// The refresh token presented on the most recent refresh call
    ///
    /// # Panics
    /// Panics if the internal mutex is poisoned (acceptable in test mocks)
    #[must_use]
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    fn next_pair(&self) -> TokenPair {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        TokenPair {
            access_token: format!("access_{n}"),
            refresh_token: format!("refresh_{n}"),
            user_id: "user_mock".to_string(),
        }
    }
}

#[async_trait]
impl OAuthClientTrait for CountingOAuthClient {
    async fn build_authorization_url(&self) -> (String, String) {
        let state = crate::auth::generate_state();
        (format!("https://auth.invalid/?state={state}"), state)
    }

    async fn exchange_code(
        &self,
        _code: &str,
        _received_state: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_pair())
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenPair, OAuthClientError> {
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_string());

        if self.fail_refresh {
            return Err(OAuthClientError::UpstreamAuth(OAuthError {
                error: "invalid_grant".to_string(),
                error_description: Some("refresh token revoked".to_string()),
            }));
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_pair())
    }
}
