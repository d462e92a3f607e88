//! Boundary traits for the collaborators adapters delegate to.
//!
//! Popup/redirect handling, provider SDK calls and the object-storage
//! client live outside this crate and are plugged in through these traits.

use async_trait::async_trait;
use std::time::Duration;

use upup_common::{ObjectKey, ProviderKind, RemoteFile, Result, Secret, SelectedFile};
use upup_config::StorageConfig;

use crate::adapter::AuthSession;

/// An OAuth authorization request ready to be shown to the user.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Provider being authorized.
    pub provider: ProviderKind,
    /// URL to open in the popup or redirect.
    pub url: String,
    /// CSRF state embedded in `url`; the response must echo it.
    pub csrf_state: String,
    /// PKCE verifier for the code exchange.
    pub pkce_verifier: Secret,
    /// Redirect URL registered with the provider.
    pub redirect_url: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
}

/// What the user-facing flow returns once the provider redirected back.
#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    /// CSRF state returned by the provider.
    pub state: String,
    /// Access token obtained by the flow.
    pub access_token: Secret,
    /// Token lifetime, if reported.
    pub expires_in: Option<Duration>,
    /// Signed-in account, if reported.
    pub account: Option<String>,
}

/// Interactive authorization (popup, redirect, token exchange).
#[async_trait]
pub trait AuthFlow: Send + Sync {
    /// Run the flow for `request`.
    ///
    /// # Errors
    /// - `Error::Authentication` if the user cancelled or the provider refused
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse>;
}

/// One page of a remote listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub files: Vec<RemoteFile>,
    /// Token for the next page; `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Remote file listing and download.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Fetch one listing page. `page_token` is `None` for the first page.
    ///
    /// # Errors
    /// - `Error::Listing` if the provider call failed
    async fn list_page(&self, session: &AuthSession, page_token: Option<&str>) -> Result<ListPage>;

    /// Download a file's complete content.
    async fn fetch(&self, session: &AuthSession, file: &RemoteFile) -> Result<Vec<u8>>;
}

/// Object-storage transfer client.
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Store `file` under `key` in the configured destination bucket.
    ///
    /// # Errors
    /// - `Error::Transfer` if the object could not be written
    async fn put_object(
        &self,
        storage: &StorageConfig,
        key: &ObjectKey,
        file: &SelectedFile,
    ) -> Result<()>;
}
