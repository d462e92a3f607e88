//! Listing, selection and upload steps shared by the adapters.

use futures::stream;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

use upup_common::{Error, ObjectKey, ProviderKind, RemoteFile, Result, SelectedFile};
use upup_config::{BaseConfig, StorageConfig};

use crate::adapter::{AuthSession, FileStream};
use crate::external::{RemoteCatalog, TransferClient};
use crate::state::{AdapterState, StateMachine};

fn as_listing_error(e: Error) -> Error {
    match e {
        Error::Listing(_) | Error::Authentication(_) => e,
        other => Error::Listing(other.to_string()),
    }
}

struct PageCursor {
    catalog: Arc<dyn RemoteCatalog>,
    session: AuthSession,
    buffer: VecDeque<RemoteFile>,
    next_page_token: Option<String>,
}

/// Fetch the first page, then hand out a stream over the remaining ones.
pub(crate) async fn open_listing(
    machine: &mut StateMachine,
    provider: ProviderKind,
    catalog: Arc<dyn RemoteCatalog>,
    session: &AuthSession,
) -> Result<FileStream> {
    session.ensure_valid_for(provider)?;
    machine.transition(AdapterState::Listing)?;

    let first = match catalog.list_page(session, None).await {
        Ok(page) => page,
        Err(e) => {
            let e = as_listing_error(e);
            warn!(%provider, error = %e, "Listing failed");
            machine.transition(AdapterState::Authenticated)?;
            return Err(e);
        }
    };
    machine.transition(AdapterState::Ready)?;
    debug!(
        %provider,
        files = first.files.len(),
        more = first.next_page_token.is_some(),
        "Listed first page"
    );

    let cursor = PageCursor {
        catalog,
        session: session.clone(),
        buffer: first.files.into(),
        next_page_token: first.next_page_token,
    };

    let files = stream::unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(file) = cursor.buffer.pop_front() {
                return Some((Ok(file), cursor));
            }
            let Some(token) = cursor.next_page_token.take() else {
                return None;
            };
            match cursor.catalog.list_page(&cursor.session, Some(&token)).await {
                Ok(page) => {
                    cursor.buffer.extend(page.files);
                    cursor.next_page_token = page.next_page_token;
                }
                Err(e) => return Some((Err(as_listing_error(e)), cursor)),
            }
        }
    });

    Ok(Box::pin(files))
}

/// Download the chosen files and pass them to the host callback.
pub(crate) async fn run_select(
    machine: &StateMachine,
    provider: ProviderKind,
    catalog: &dyn RemoteCatalog,
    session: Option<&AuthSession>,
    base: &BaseConfig,
    allow_multiple: bool,
    files: Vec<RemoteFile>,
) -> Result<Vec<SelectedFile>> {
    machine.require(AdapterState::Ready, "select")?;
    let session = session.ok_or_else(|| {
        Error::InvalidState(format!("{} adapter has no session", provider))
    })?;

    if files.len() > 1 && !allow_multiple {
        return Err(Error::InvalidInput(format!(
            "{} picker allows a single file, got {}",
            provider,
            files.len()
        )));
    }
    if let Some(foreign) = files.iter().find(|file| file.provider != provider) {
        return Err(Error::InvalidInput(format!(
            "'{}' was listed by {}, not {}",
            foreign.name, foreign.provider, provider
        )));
    }
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let mut selected = Vec::with_capacity(files.len());
    for file in &files {
        let data = catalog.fetch(session, file).await?;
        selected.push(SelectedFile::from_remote(file, data));
    }

    debug!(%provider, files = selected.len(), "Files selected");
    base.files_selected(selected.clone());
    Ok(selected)
}

/// Writes selected files to the destination bucket through the gate.
pub(crate) struct Uploader {
    provider: ProviderKind,
    base: Arc<BaseConfig>,
    storage: StorageConfig,
    transfer: Arc<dyn TransferClient>,
}

impl Uploader {
    pub(crate) fn new(
        provider: ProviderKind,
        base: Arc<BaseConfig>,
        storage: StorageConfig,
        transfer: Arc<dyn TransferClient>,
    ) -> Self {
        Self {
            provider,
            base,
            storage,
            transfer,
        }
    }

    /// Transfer files one at a time, recording each key on completion.
    async fn upload(&self, files: &[SelectedFile]) -> Result<Vec<ObjectKey>> {
        let mut keys = Vec::with_capacity(files.len());
        for file in files {
            self.base.gate().begin_transfer(self.provider, &file.name)?;

            let key = ObjectKey::for_file(&file.name);
            self.transfer
                .put_object(&self.storage, &key, file)
                .await
                .map_err(|e| match e {
                    Error::Transfer(_) => e,
                    other => Error::Transfer(other.to_string()),
                })?;

            self.base.record_key(key.as_str())?;
            keys.push(key);
        }
        Ok(keys)
    }

    /// Run an upload from `Ready`, returning to `Ready` whatever the outcome.
    pub(crate) async fn run(
        &self,
        machine: &mut StateMachine,
        files: &[SelectedFile],
    ) -> Result<Vec<ObjectKey>> {
        machine.require(AdapterState::Ready, "upload")?;
        if !self.base.upload_enabled() {
            return Err(Error::UploadDisabled(format!(
                "{} upload requested while uploads are disabled",
                self.provider
            )));
        }

        machine.transition(AdapterState::Uploading)?;
        let result = self.upload(files).await;
        machine.transition(AdapterState::Ready)?;

        if let Err(e) = &result {
            warn!(provider = %self.provider, error = %e, "Upload failed");
        }
        result
    }
}
