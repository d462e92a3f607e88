//! Provider adapter trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::Stream;
use std::pin::Pin;

use upup_common::{Error, ObjectKey, ProviderKind, RemoteFile, Result, Secret, SelectedFile};

use crate::state::AdapterState;

/// Lazy, finite sequence of listed files.
pub type FileStream = Pin<Box<dyn Stream<Item = Result<RemoteFile>> + Send>>;

/// Extra credentials the Google picker needs next to the access token.
#[derive(Debug, Clone)]
pub struct PickerContext {
    pub app_id: String,
    pub api_key: Secret,
}

/// An authenticated provider session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Provider that issued the session.
    pub provider: ProviderKind,
    /// Bearer token (or access key for object storage).
    pub access_token: Secret,
    /// Account or bucket the session is bound to, if known.
    pub account: Option<String>,
    /// When the token expires; `None` for static credentials.
    pub expires_at: Option<DateTime<Utc>>,
    /// Google picker credentials.
    pub picker: Option<PickerContext>,
}

impl AuthSession {
    /// Create a session with a non-expiring token.
    pub fn new(provider: ProviderKind, access_token: Secret) -> Self {
        Self {
            provider,
            access_token,
            account: None,
            expires_at: None,
            picker: None,
        }
    }

    /// Check if the token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        match self.expires_at {
            Some(expires_at) => expires_at < Utc::now() + Duration::minutes(5),
            None => false,
        }
    }

    /// Fail unless this session was issued by `provider` and is still valid.
    pub fn ensure_valid_for(&self, provider: ProviderKind) -> Result<()> {
        if self.provider != provider {
            return Err(Error::Authentication(format!(
                "Session was issued by {}, not {}",
                self.provider, provider
            )));
        }
        if self.is_expired() {
            return Err(Error::Authentication(format!(
                "{} session has expired",
                provider
            )));
        }
        Ok(())
    }
}

/// Provider adapter for one remote storage backend.
///
/// Adapters authenticate, list remote files and hand selected files to
/// the host through the shared `BaseConfig`. Transfers go through the
/// upload gate; an adapter must never start one while the gate is closed,
/// and records a key only after its transfer completed.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Current lifecycle state.
    fn state(&self) -> AdapterState;

    /// Establish a session.
    ///
    /// # Postconditions
    /// - `Authenticated` on success
    /// - `Unauthenticated` on failure; calling again retries
    ///
    /// # Errors
    /// - `Error::Authentication` if the provider or the user refused
    async fn authenticate(&mut self) -> Result<AuthSession>;

    /// List remote files.
    ///
    /// The first page is fetched before returning, so listing failures
    /// surface here. Later pages are fetched as the stream is polled.
    /// Calling again restarts from the first page.
    ///
    /// # Errors
    /// - `Error::Listing` if the provider call failed (retryable)
    /// - `Error::Unsupported` if the adapter cannot list
    async fn list_files(&mut self, session: &AuthSession) -> Result<FileStream>;

    /// Materialize the chosen files and hand them to the host callback.
    ///
    /// Does not transfer anything and does not record keys.
    async fn select(&mut self, files: Vec<RemoteFile>) -> Result<Vec<SelectedFile>>;

    /// Transfer materialized files to the destination bucket.
    ///
    /// Each key is recorded once its transfer completes; a failed transfer
    /// records nothing for that file.
    ///
    /// # Errors
    /// - `Error::UploadDisabled` if the gate is closed
    /// - `Error::Transfer` if the transfer client failed
    async fn upload(&mut self, files: &[SelectedFile]) -> Result<Vec<ObjectKey>>;

    /// Forget an in-flight authentication, listing or upload whose future
    /// was dropped.
    fn abandon(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiration() {
        let mut session = AuthSession::new(ProviderKind::GoogleDrive, Secret::new("t"));
        assert!(!session.is_expired());

        session.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(session.is_expired());

        // Token expiring in 4 minutes should be considered expired (5 min buffer)
        session.expires_at = Some(Utc::now() + Duration::minutes(4));
        assert!(session.is_expired());

        session.expires_at = Some(Utc::now() + Duration::hours(1));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_provider_mismatch() {
        let session = AuthSession::new(ProviderKind::OneDrive, Secret::new("t"));
        assert!(session.ensure_valid_for(ProviderKind::OneDrive).is_ok());
        assert!(matches!(
            session.ensure_valid_for(ProviderKind::GoogleDrive),
            Err(Error::Authentication(_))
        ));
    }
}
