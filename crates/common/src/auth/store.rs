//! Credential persistence for the upstream refresh token
//!
//! The service holds a single logical session, so the store is keyed
//! implicitly by one configured file path: a plain-text file holding the
//! current refresh token. Writes are whole-file overwrites (last write
//! wins); there is no versioning.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

/// Error type for credential store operations
#[derive(Debug)]
pub struct StoreError(pub io::Error);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential store error: {}", self.0)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self(err)
    }
}

/// Trait for refresh-token persistence
///
/// Abstracts credential storage to enable testing with in-memory
/// implementations and to keep the token manager free of filesystem
/// details.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted refresh token
    ///
    /// # Returns
    /// `Ok(None)` when no credential has ever been saved; this is the
    /// expected first-run state, not a failure.
    ///
    /// # Errors
    /// Returns error if the storage location exists but cannot be read
    async fn load(&self) -> Result<Option<String>, StoreError>;

    /// Persist a refresh token, replacing any previous value
    ///
    /// # Errors
    /// Returns error if the write fails
    async fn save(&self, refresh_token: &str) -> Result<(), StoreError>;
}

/// File-backed credential store
///
/// Stores the refresh token at a well-known path, creating the parent
/// directory on first save.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim_end().to_string();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token))
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored credential found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, refresh_token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, refresh_token).await?;
        debug!(path = %self.path.display(), "Persisted refresh token");
        Ok(())
    }
}
