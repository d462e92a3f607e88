//! Google Drive adapter.
//!
//! Authenticates through the Google picker OAuth flow, lists and
//! downloads through a [`RemoteCatalog`], and uploads selected files to
//! the destination bucket.

use async_trait::async_trait;
use std::sync::Arc;

use upup_common::{ObjectKey, ProviderKind, RemoteFile, Result, SelectedFile};
use upup_config::{BaseConfig, GoogleConfig, StorageConfig};

use crate::adapter::{AuthSession, FileStream, PickerContext, ProviderAdapter};
use crate::external::{AuthFlow, RemoteCatalog, TransferClient};
use crate::oauth::{authenticate_with, google_authorization_request};
use crate::state::{AdapterState, StateMachine};
use crate::transfer::{open_listing, run_select, Uploader};

/// Adapter for Google Drive.
pub struct GoogleDriveAdapter {
    machine: StateMachine,
    base: Arc<BaseConfig>,
    config: GoogleConfig,
    redirect_url: String,
    flow: Arc<dyn AuthFlow>,
    catalog: Arc<dyn RemoteCatalog>,
    uploader: Uploader,
    session: Option<AuthSession>,
}

impl GoogleDriveAdapter {
    /// Create a Google Drive adapter.
    pub fn new(
        base: Arc<BaseConfig>,
        config: GoogleConfig,
        storage: StorageConfig,
        redirect_url: impl Into<String>,
        flow: Arc<dyn AuthFlow>,
        catalog: Arc<dyn RemoteCatalog>,
        transfer: Arc<dyn TransferClient>,
    ) -> Self {
        let uploader = Uploader::new(ProviderKind::GoogleDrive, base.clone(), storage, transfer);
        Self {
            machine: StateMachine::new(ProviderKind::GoogleDrive),
            base,
            config,
            redirect_url: redirect_url.into(),
            flow,
            catalog,
            uploader,
            session: None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for GoogleDriveAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    fn state(&self) -> AdapterState {
        self.machine.current()
    }

    async fn authenticate(&mut self) -> Result<AuthSession> {
        let request = google_authorization_request(&self.config, &self.redirect_url)?;
        let picker = PickerContext {
            app_id: self.config.app_id.clone(),
            api_key: self.config.api_key.clone(),
        };

        self.session = None;
        let session =
            authenticate_with(&mut self.machine, self.flow.as_ref(), request, Some(picker)).await?;
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn list_files(&mut self, session: &AuthSession) -> Result<FileStream> {
        open_listing(
            &mut self.machine,
            ProviderKind::GoogleDrive,
            self.catalog.clone(),
            session,
        )
        .await
    }

    async fn select(&mut self, files: Vec<RemoteFile>) -> Result<Vec<SelectedFile>> {
        run_select(
            &self.machine,
            ProviderKind::GoogleDrive,
            self.catalog.as_ref(),
            self.session.as_ref(),
            &self.base,
            self.config.allow_multi_select,
            files,
        )
        .await
    }

    async fn upload(&mut self, files: &[SelectedFile]) -> Result<Vec<ObjectKey>> {
        self.uploader.run(&mut self.machine, files).await
    }

    fn abandon(&mut self) {
        self.machine.abandon();
    }
}
