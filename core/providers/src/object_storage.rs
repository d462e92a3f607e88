//! Object-storage adapter.
//!
//! Authentication is local: the static credentials from the storage
//! bundle become the session. Listing and download go through a
//! [`RemoteCatalog`] over the destination bucket.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use upup_common::{ObjectKey, ProviderKind, RemoteFile, Result, SelectedFile};
use upup_config::{BaseConfig, StorageConfig};

use crate::adapter::{AuthSession, FileStream, ProviderAdapter};
use crate::external::{RemoteCatalog, TransferClient};
use crate::state::{AdapterState, StateMachine};
use crate::transfer::{open_listing, run_select, Uploader};

/// Adapter for S3-compatible object storage.
pub struct ObjectStorageAdapter {
    machine: StateMachine,
    base: Arc<BaseConfig>,
    storage: StorageConfig,
    catalog: Arc<dyn RemoteCatalog>,
    uploader: Uploader,
    session: Option<AuthSession>,
}

impl ObjectStorageAdapter {
    /// Create an adapter over the destination bucket in `storage`.
    pub fn new(
        base: Arc<BaseConfig>,
        storage: StorageConfig,
        catalog: Arc<dyn RemoteCatalog>,
        transfer: Arc<dyn TransferClient>,
    ) -> Self {
        let uploader = Uploader::new(
            ProviderKind::ObjectStorage,
            base.clone(),
            storage.clone(),
            transfer,
        );
        Self {
            machine: StateMachine::new(ProviderKind::ObjectStorage),
            base,
            storage,
            catalog,
            uploader,
            session: None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ObjectStorageAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ObjectStorage
    }

    fn state(&self) -> AdapterState {
        self.machine.current()
    }

    async fn authenticate(&mut self) -> Result<AuthSession> {
        self.machine.transition(AdapterState::Authenticating)?;

        let mut session = AuthSession::new(
            ProviderKind::ObjectStorage,
            self.storage.credentials.access_key.clone(),
        );
        session.account = Some(self.storage.destination_bucket.clone());

        self.machine.transition(AdapterState::Authenticated)?;
        info!(bucket = %self.storage.destination_bucket, "Object storage session ready");

        self.session = Some(session.clone());
        Ok(session)
    }

    async fn list_files(&mut self, session: &AuthSession) -> Result<FileStream> {
        open_listing(
            &mut self.machine,
            ProviderKind::ObjectStorage,
            self.catalog.clone(),
            session,
        )
        .await
    }

    async fn select(&mut self, files: Vec<RemoteFile>) -> Result<Vec<SelectedFile>> {
        run_select(
            &self.machine,
            ProviderKind::ObjectStorage,
            self.catalog.as_ref(),
            self.session.as_ref(),
            &self.base,
            self.base.allow_multiple(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCatalog, MemoryTransfer};
    use futures::TryStreamExt;
    use std::time::Duration;
    use upup_common::Error;
    use upup_config::{build, BuildOptions, EnvironmentSecrets, MapEnv, UploadGate, REQUIRED_VARS};

    fn configs(gate: UploadGate) -> upup_config::ProviderConfigs {
        let env: MapEnv = REQUIRED_VARS.iter().map(|name| (*name, "v")).collect();
        let secrets = EnvironmentSecrets::from_env(&env).unwrap();
        build(
            secrets,
            BuildOptions::new().with_document(Some(true)).with_allow_multiple(true),
            gate,
        )
    }

    /// Transfer client whose writes never finish.
    struct StalledTransfer;

    #[async_trait]
    impl TransferClient for StalledTransfer {
        async fn put_object(
            &self,
            _storage: &StorageConfig,
            _key: &ObjectKey,
            _file: &SelectedFile,
        ) -> Result<()> {
            futures::future::pending().await
        }
    }

    fn adapter(gate: UploadGate) -> (ObjectStorageAdapter, Arc<MemoryCatalog>, Arc<MemoryTransfer>) {
        let configs = configs(gate);
        let catalog = Arc::new(MemoryCatalog::new(ProviderKind::ObjectStorage));
        let transfer = Arc::new(MemoryTransfer::new());
        let adapter = ObjectStorageAdapter::new(
            configs.base.clone(),
            configs.storage.clone(),
            catalog.clone(),
            transfer.clone(),
        );
        (adapter, catalog, transfer)
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let gate = UploadGate::new();
        let (mut adapter, catalog, transfer) = adapter(gate.clone());
        catalog.add_file("a.pdf", b"aaa".to_vec());
        catalog.add_file("b.pdf", b"bbb".to_vec());

        let session = adapter.authenticate().await.unwrap();
        assert_eq!(session.account.as_deref(), Some("v"));
        assert_eq!(adapter.state(), AdapterState::Authenticated);

        let files: Vec<RemoteFile> = adapter
            .list_files(&session)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(adapter.state(), AdapterState::Ready);

        let selected = adapter.select(files).await.unwrap();
        assert_eq!(selected.len(), 2);

        gate.set_enabled(true);
        let keys = adapter.upload(&selected).await.unwrap();
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert_eq!(
            gate.keys(),
            keys.iter().map(|k| k.to_string()).collect::<Vec<_>>()
        );
        assert_eq!(transfer.objects().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_blocked_while_gate_closed() {
        let gate = UploadGate::new();
        let (mut adapter, catalog, transfer) = adapter(gate.clone());
        catalog.add_file("a.pdf", b"aaa".to_vec());

        let session = adapter.authenticate().await.unwrap();
        let files: Vec<RemoteFile> = adapter
            .list_files(&session)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let selected = adapter.select(files).await.unwrap();

        let err = adapter.upload(&selected).await.unwrap_err();
        assert!(matches!(err, Error::UploadDisabled(_)));
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert!(gate.keys().is_empty());
        assert!(transfer.objects().is_empty());
    }

    #[tokio::test]
    async fn test_list_before_authenticate_fails() {
        let (mut adapter, _, _) = adapter(UploadGate::new());
        let session = AuthSession::new(
            ProviderKind::ObjectStorage,
            upup_common::Secret::new("key"),
        );
        let err = adapter.list_files(&session).await.err().unwrap();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_dropped_upload_recovers_after_abandon() {
        let gate = UploadGate::new();
        let configs = configs(gate.clone());
        let catalog = Arc::new(MemoryCatalog::new(ProviderKind::ObjectStorage));
        catalog.add_file("a.pdf", b"aaa".to_vec());
        let mut adapter = ObjectStorageAdapter::new(
            configs.base.clone(),
            configs.storage.clone(),
            catalog,
            Arc::new(StalledTransfer),
        );

        let session = adapter.authenticate().await.unwrap();
        let files: Vec<RemoteFile> = adapter
            .list_files(&session)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let selected = adapter.select(files).await.unwrap();
        gate.set_enabled(true);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), adapter.upload(&selected)).await;
        assert!(timed_out.is_err());
        assert_eq!(adapter.state(), AdapterState::Uploading);

        adapter.abandon();
        assert_eq!(adapter.state(), AdapterState::Ready);
        assert!(gate.keys().is_empty());

        adapter.authenticate().await.unwrap();
        assert_eq!(adapter.state(), AdapterState::Authenticated);
    }
}
