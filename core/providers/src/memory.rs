//! In-memory collaborators for testing.
//!
//! Useful for tests and demos: a catalog that lists and serves files held
//! in memory, a transfer client that stores objects in memory, and an
//! auth flow that answers immediately.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use upup_common::{Error, ObjectKey, ProviderKind, RemoteFile, Result, Secret, SelectedFile};
use upup_config::StorageConfig;

use crate::adapter::AuthSession;
use crate::external::{
    AuthFlow, AuthorizationRequest, AuthorizationResponse, ListPage, RemoteCatalog,
    TransferClient,
};

/// Default number of files per listing page.
const DEFAULT_PAGE_SIZE: usize = 50;

/// In-memory remote catalog.
pub struct MemoryCatalog {
    provider: ProviderKind,
    entries: RwLock<Vec<(RemoteFile, Vec<u8>)>>,
    page_size: usize,
    fail_listing: AtomicBool,
    list_calls: AtomicUsize,
}

impl MemoryCatalog {
    /// Create an empty catalog for `provider`.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            entries: RwLock::new(Vec::new()),
            page_size: DEFAULT_PAGE_SIZE,
            fail_listing: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Set the listing page size (at least 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a file and return its listing entry.
    pub fn add_file(&self, name: impl Into<String>, data: Vec<u8>) -> RemoteFile {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let file = RemoteFile::new(self.provider, format!("mem-{}", entries.len()), name)
            .with_size(data.len() as u64);
        entries.push((file.clone(), data));
        file
    }

    /// Make every listing call fail until reset.
    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Number of `list_page` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteCatalog for MemoryCatalog {
    async fn list_page(&self, session: &AuthSession, page_token: Option<&str>) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::Listing("simulated listing failure".to_string()));
        }
        session.ensure_valid_for(self.provider)?;

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::Listing(format!("Invalid page token: {}", token)))?,
            None => 0,
        };

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let end = (offset + self.page_size).min(entries.len());
        let files = entries
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|(file, _)| file.clone())
            .collect();
        let next_page_token = (end < entries.len()).then(|| end.to_string());

        Ok(ListPage {
            files,
            next_page_token,
        })
    }

    async fn fetch(&self, session: &AuthSession, file: &RemoteFile) -> Result<Vec<u8>> {
        session.ensure_valid_for(self.provider)?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|(entry, _)| entry.id == file.id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| Error::NotFound(format!("Remote file not found: {}", file.id)))
    }
}

/// An object written by [`MemoryTransfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub data: Vec<u8>,
}

/// In-memory transfer client.
#[derive(Default)]
pub struct MemoryTransfer {
    objects: RwLock<Vec<StoredObject>>,
    failing: RwLock<HashSet<String>>,
}

impl MemoryTransfer {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every transfer of a file with this name.
    pub fn fail_on(&self, file_name: impl Into<String>) {
        self.failing
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_name.into());
    }

    /// Objects stored so far, in write order.
    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TransferClient for MemoryTransfer {
    async fn put_object(
        &self,
        storage: &StorageConfig,
        key: &ObjectKey,
        file: &SelectedFile,
    ) -> Result<()> {
        let failing = self
            .failing
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&file.name);
        if failing {
            return Err(Error::Transfer(format!("simulated failure for {}", file.name)));
        }

        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredObject {
                bucket: storage.destination_bucket.clone(),
                key: key.to_string(),
                data: file.data.clone(),
            });
        Ok(())
    }
}

enum FlowBehavior {
    Approve { token: String },
    Deny,
    Pending,
}

/// Auth flow that answers without user interaction.
pub struct StaticAuthFlow {
    behavior: FlowBehavior,
}

impl StaticAuthFlow {
    /// Approve every request with `token`, valid for one hour.
    pub fn approving(token: impl Into<String>) -> Self {
        Self {
            behavior: FlowBehavior::Approve {
                token: token.into(),
            },
        }
    }

    /// Reject every request, as if the user closed the popup.
    pub fn denying() -> Self {
        Self {
            behavior: FlowBehavior::Deny,
        }
    }

    /// Never answer, as if the user left the popup open.
    pub fn pending() -> Self {
        Self {
            behavior: FlowBehavior::Pending,
        }
    }
}

#[async_trait]
impl AuthFlow for StaticAuthFlow {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse> {
        match &self.behavior {
            FlowBehavior::Approve { token } => Ok(AuthorizationResponse {
                state: request.csrf_state.clone(),
                access_token: Secret::new(token.clone()),
                expires_in: Some(Duration::from_secs(3600)),
                account: Some(format!("user@{}", request.provider)),
            }),
            FlowBehavior::Deny => Err(Error::Authentication(format!(
                "User cancelled {} sign-in",
                request.provider
            ))),
            FlowBehavior::Pending => futures::future::pending().await,
        }
    }
}
