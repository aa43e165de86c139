//! Token manager: in-memory session state with single-flight refresh
//!
//! Manages the OAuth token lifecycle:
//! - Bootstrap from the persisted refresh token on process start
//! - Refresh via the upstream token endpoint, serialized so at most one
//!   refresh is in flight at a time
//! - Persistence of every newly rotated refresh token

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::client::OAuthClientError;
use super::store::CredentialStore;
use super::traits::OAuthClientTrait;
use super::types::TokenPair;

/// Error type for token manager operations
#[derive(Debug)]
pub enum TokenManagerError {
    /// No session (neither bootstrap nor code exchange has succeeded)
    NotAuthenticated,

    /// Session exists but carries an empty refresh token
    NoRefreshToken,

    /// Upstream rejected the refresh; the session is terminal and the
    /// authorization flow must be restarted
    RefreshFailed(OAuthClientError),
}

impl std::fmt::Display for TokenManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "Not authenticated (no session)"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::RefreshFailed(e) => write!(f, "Token refresh failed: {e}"),
        }
    }
}

impl std::error::Error for TokenManagerError {}

/// Token manager holding the single process-wide session
///
/// One [`TokenPair`] is shared by all in-flight requests. The access token
/// and user id never leave memory; the refresh token is handed to the
/// credential store after every rotation.
///
/// Refreshes are single-flight: a caller that queues behind an in-flight
/// refresh adopts its outcome instead of issuing a second upstream call.
pub struct TokenManager<C: OAuthClientTrait + 'static, S: CredentialStore + 'static> {
    oauth_client: Arc<C>,
    store: Arc<S>,
    session: Arc<RwLock<Option<TokenPair>>>,
    refresh_gate: Arc<Mutex<()>>,
    generation: Arc<AtomicU64>,
}

impl<C: OAuthClientTrait + 'static, S: CredentialStore + 'static> TokenManager<C, S> {
    /// Create a new token manager
    ///
    /// # Arguments
    /// * `oauth_client` - OAuth client for code exchange and refresh
    /// * `store` - Credential store for refresh-token persistence
    #[must_use]
    pub fn new(oauth_client: C, store: Arc<S>) -> Self {
        Self {
            oauth_client: Arc::new(oauth_client),
            store,
            session: Arc::new(RwLock::new(None)),
            refresh_gate: Arc::new(Mutex::new(())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bootstrap the session from the persisted refresh token
    ///
    /// Should be called on process start. Loads the stored refresh token
    /// and, if present, immediately refreshes to obtain a usable access
    /// token. Every failure path is logged and non-fatal: the manager stays
    /// unauthenticated and a caller must re-run the authorization flow.
    ///
    /// # Returns
    /// `true` if a session was established, `false` otherwise
    pub async fn bootstrap(&self) -> bool {
        let refresh_token = match self.store.load().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No stored credential; waiting for authorization flow");
                return false;
            }
            Err(e) => {
                // A read failure is treated as "no existing session"
                warn!(error = %e, "Failed to read stored credential");
                return false;
            }
        };

        info!("Existing refresh token found; refreshing session");

        match self.oauth_client.refresh_access_token(&refresh_token).await {
            Ok(pair) => {
                self.install(pair).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Bootstrap refresh failed; re-authorization required");
                false
            }
        }
    }

    /// Install a freshly obtained token pair
    ///
    /// Used after a successful code exchange or refresh. Replaces the
    /// in-memory session and persists the new refresh token. A persistence
    /// failure is logged but does not roll back the in-memory pair: the
    /// access token remains valid for the current process lifetime.
    pub async fn install(&self, pair: TokenPair) {
        if let Err(e) = self.store.save(&pair.refresh_token).await {
            error!(error = %e, "Failed to persist refresh token; session is not durable");
        }

        *self.session.write().await = Some(pair);
        self.generation.fetch_add(1, Ordering::AcqRel);

        info!("Session tokens installed");
    }

    /// Exchange the current refresh token for a new token pair
    ///
    /// Serialized: only one refresh is in flight at a time. A caller that
    /// waited behind a refresh which completed meanwhile returns `Ok`
    /// without touching the upstream.
    ///
    /// # Errors
    /// Returns [`TokenManagerError::RefreshFailed`] if the upstream rejects
    /// the refresh token; the session must then be re-established through
    /// the authorization flow.
    pub async fn refresh(&self) -> Result<(), TokenManagerError> {
        let observed = self.generation.load(Ordering::Acquire);

        let _gate = self.refresh_gate.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            debug!("Adopting concurrent refresh outcome");
            return Ok(());
        }

        let refresh_token = {
            let session = self.session.read().await;
            let pair = session.as_ref().ok_or(TokenManagerError::NotAuthenticated)?;
            if pair.refresh_token.is_empty() {
                return Err(TokenManagerError::NoRefreshToken);
            }
            pair.refresh_token.clone()
        };

        let pair = self
            .oauth_client
            .refresh_access_token(&refresh_token)
            .await
            .map_err(TokenManagerError::RefreshFailed)?;

        self.install(pair).await;

        info!("Access token refreshed");

        Ok(())
    }

    /// Get the current access token
    ///
    /// # Errors
    /// Returns [`TokenManagerError::NotAuthenticated`] before the first
    /// successful exchange or bootstrap
    pub async fn current_access_token(&self) -> Result<String, TokenManagerError> {
        let session = self.session.read().await;
        session
            .as_ref()
            .map(|pair| pair.access_token.clone())
            .ok_or(TokenManagerError::NotAuthenticated)
    }

    /// Upstream user id of the current session, if authenticated
    pub async fn user_id(&self) -> Option<String> {
        self.session.read().await.as_ref().map(|pair| pair.user_id.clone())
    }

    /// Check whether a session is established
    #[must_use]
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::token_manager.
    use std::time::Duration;

    use super::*;
    use crate::testing::{CountingOAuthClient, MockCredentialStore};

    fn manager_with(
        client: CountingOAuthClient,
        store: MockCredentialStore,
    ) -> (TokenManager<CountingOAuthClient, MockCredentialStore>, Arc<MockCredentialStore>) {
        let store = Arc::new(store);
        (TokenManager::new(client, store.clone()), store)
    }

    fn test_pair() -> TokenPair {
        TokenPair {
            access_token: "access_seed".to_string(),
            refresh_token: "refresh_seed".to_string(),
            user_id: "user_1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_not_authenticated_before_install() {
        let (manager, _store) = manager_with(CountingOAuthClient::new(), MockCredentialStore::new());

        assert!(!manager.is_authenticated().await);
        let result = manager.current_access_token().await;
        assert!(matches!(result, Err(TokenManagerError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_install_persists_refresh_token_only() {
        let (manager, store) = manager_with(CountingOAuthClient::new(), MockCredentialStore::new());

        manager.install(test_pair()).await;

        assert!(manager.is_authenticated().await);
        assert_eq!(manager.current_access_token().await.unwrap(), "access_seed");
        assert_eq!(manager.user_id().await.as_deref(), Some("user_1"));

        // Only the refresh token reaches the store
        assert_eq!(store.stored().as_deref(), Some("refresh_seed"));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_persists_newest_token() {
        let (manager, store) = manager_with(CountingOAuthClient::new(), MockCredentialStore::new());

        manager.install(test_pair()).await;
        manager.refresh().await.unwrap();

        assert_eq!(manager.current_access_token().await.unwrap(), "access_1");
        // The rotated refresh token supersedes the seeded one
        assert_eq!(store.stored().as_deref(), Some("refresh_1"));
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn test_refresh_without_session_fails() {
        let (manager, _store) = manager_with(CountingOAuthClient::new(), MockCredentialStore::new());

        let result = manager.refresh().await;
        assert!(matches!(result, Err(TokenManagerError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_surfaced() {
        let (manager, _store) =
            manager_with(CountingOAuthClient::failing_refresh(), MockCredentialStore::new());

        manager.install(test_pair()).await;

        let result = manager.refresh().await;
        assert!(matches!(result, Err(TokenManagerError::RefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_single_flight() {
        let client = CountingOAuthClient::with_delay(Duration::from_millis(50));
        let store = Arc::new(MockCredentialStore::new());
        let manager = Arc::new(TokenManager::new(client, store));

        manager.install(test_pair()).await;

        let a = manager.clone();
        let b = manager.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.refresh().await }),
            tokio::spawn(async move { b.refresh().await }),
        );

        ra.unwrap().unwrap();
        rb.unwrap().unwrap();

        // Exactly one refresh reached the upstream; the second caller
        // adopted its outcome
        assert_eq!(manager.oauth_client.refresh_calls(), 1);
        assert_eq!(manager.current_access_token().await.unwrap(), "access_1");
    }

    #[tokio::test]
    async fn test_bootstrap_with_empty_store() {
        let (manager, _store) = manager_with(CountingOAuthClient::new(), MockCredentialStore::new());

        assert!(!manager.bootstrap().await);
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_bootstrap_refreshes_stored_credential() {
        let (manager, store) =
            manager_with(CountingOAuthClient::new(), MockCredentialStore::with_token("refresh_old"));

        assert!(manager.bootstrap().await);
        assert!(manager.is_authenticated().await);

        // The stored token was presented upstream and the rotated
        // replacement persisted
        assert_eq!(manager.oauth_client.last_refresh_token().as_deref(), Some("refresh_old"));
        assert_eq!(store.stored().as_deref(), Some("refresh_1"));
    }

    #[tokio::test]
    async fn test_bootstrap_refresh_failure_is_non_fatal() {
        let (manager, _store) = manager_with(
            CountingOAuthClient::failing_refresh(),
            MockCredentialStore::with_token("refresh_revoked"),
        );

        assert!(!manager.bootstrap().await);
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_bootstrap_load_failure_is_non_fatal() {
        let (manager, _store) =
            manager_with(CountingOAuthClient::new(), MockCredentialStore::failing_loads());

        assert!(!manager.bootstrap().await);
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_in_memory_session() {
        let (manager, _store) =
            manager_with(CountingOAuthClient::new(), MockCredentialStore::failing_saves());

        manager.install(test_pair()).await;

        // Write failure is logged but the session stays usable
        assert!(manager.is_authenticated().await);
        assert_eq!(manager.current_access_token().await.unwrap(), "access_seed");
    }
}
