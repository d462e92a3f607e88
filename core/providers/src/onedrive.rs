//! OneDrive adapter.
//!
//! Only authentication is implemented. Listing, selection and upload
//! report `Error::Unsupported` and park the adapter in
//! `AdapterState::NotImplemented` until the host authenticates again.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use upup_common::{Error, ObjectKey, ProviderKind, RemoteFile, Result, SelectedFile};
use upup_config::OneDriveConfig;

use crate::adapter::{AuthSession, FileStream, ProviderAdapter};
use crate::external::AuthFlow;
use crate::oauth::{authenticate_with, onedrive_authorization_request};
use crate::state::{AdapterState, StateMachine};

/// Adapter for Microsoft OneDrive.
pub struct OneDriveAdapter {
    machine: StateMachine,
    config: OneDriveConfig,
    redirect_url: String,
    flow: Arc<dyn AuthFlow>,
}

impl OneDriveAdapter {
    /// Create a OneDrive adapter.
    pub fn new(
        config: OneDriveConfig,
        redirect_url: impl Into<String>,
        flow: Arc<dyn AuthFlow>,
    ) -> Self {
        Self {
            machine: StateMachine::new(ProviderKind::OneDrive),
            config,
            redirect_url: redirect_url.into(),
            flow,
        }
    }

    /// Whether the picker may return several files.
    pub fn allow_multi_select(&self) -> bool {
        self.config.allow_multi_select
    }

    fn unsupported(&mut self, operation: &str) -> Error {
        if self.machine.current().can_transition_to(AdapterState::NotImplemented) {
            self.machine.transition(AdapterState::NotImplemented).ok();
        }
        warn!(operation, "OneDrive operation is not implemented");
        Error::Unsupported(format!("OneDrive {} is not implemented", operation))
    }
}

#[async_trait]
impl ProviderAdapter for OneDriveAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OneDrive
    }

    fn state(&self) -> AdapterState {
        self.machine.current()
    }

    async fn authenticate(&mut self) -> Result<AuthSession> {
        let request = onedrive_authorization_request(&self.config, &self.redirect_url)?;
        authenticate_with(&mut self.machine, self.flow.as_ref(), request, None).await
    }

    async fn list_files(&mut self, session: &AuthSession) -> Result<FileStream> {
        session.ensure_valid_for(ProviderKind::OneDrive)?;
        Err(self.unsupported("file listing"))
    }

    async fn select(&mut self, _files: Vec<RemoteFile>) -> Result<Vec<SelectedFile>> {
        Err(self.unsupported("file selection"))
    }

    async fn upload(&mut self, _files: &[SelectedFile]) -> Result<Vec<ObjectKey>> {
        Err(self.unsupported("upload"))
    }

    fn abandon(&mut self) {
        self.machine.abandon();
    }
}
