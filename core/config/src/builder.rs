//! Provider configuration builder.
//!
//! Derives the four per-provider bundles from validated secrets and the
//! per-invocation options. Derivation is pure and infallible.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use upup_common::{Result, Secret, SelectedFile};

use crate::env::EnvironmentSecrets;
use crate::gate::UploadGate;

/// Host callback receiving materialized files after a selection.
pub type FilesSelectedCallback = Arc<dyn Fn(Vec<SelectedFile>) + Send + Sync>;

/// Per-invocation options.
///
/// Defaults: image destination, single selection, selections discarded.
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// `Some(true)` targets the document bucket; `None` and `Some(false)`
    /// both target the image bucket.
    pub is_document: Option<bool>,
    /// Whether pickers may return more than one file.
    pub allow_multiple: bool,
    /// Host callback for selected files.
    pub on_files_selected: Option<FilesSelectedCallback>,
}

impl BuildOptions {
    /// Options with the documented defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the document or image destination.
    pub fn with_document(mut self, is_document: Option<bool>) -> Self {
        self.is_document = is_document;
        self
    }

    /// Allow or forbid multiple selection.
    pub fn with_allow_multiple(mut self, allow_multiple: bool) -> Self {
        self.allow_multiple = allow_multiple;
        self
    }

    /// Set the callback receiving selected files.
    pub fn with_on_files_selected<F>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<SelectedFile>) + Send + Sync + 'static,
    {
        self.on_files_selected = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("is_document", &self.is_document)
            .field("allow_multiple", &self.allow_multiple)
            .field("on_files_selected", &self.on_files_selected.is_some())
            .finish()
    }
}

/// Logical destination bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Document,
    Image,
}

impl Destination {
    /// Resolve the tri-state document flag. Unset means image.
    pub fn from_flag(is_document: Option<bool>) -> Self {
        if is_document.unwrap_or(false) {
            Destination::Document
        } else {
            Destination::Image
        }
    }
}

/// Configuration shared by reference with every adapter.
///
/// Holds the upload gate handle, so the flag and key log it exposes are
/// live, not copies.
#[derive(Clone)]
pub struct BaseConfig {
    gate: UploadGate,
    on_files_selected: Option<FilesSelectedCallback>,
    allow_multiple: bool,
}

impl BaseConfig {
    /// Whether adapters may start transfers right now.
    pub fn upload_enabled(&self) -> bool {
        self.gate.is_enabled()
    }

    /// Whether pickers may return more than one file.
    pub fn allow_multiple(&self) -> bool {
        self.allow_multiple
    }

    /// Hand selected files to the host.
    ///
    /// Without a host callback the files are dropped silently.
    pub fn files_selected(&self, files: Vec<SelectedFile>) {
        if let Some(callback) = &self.on_files_selected {
            callback(files);
        }
    }

    /// Register the key of a completed upload.
    pub fn record_key(&self, key: impl Into<String>) -> Result<()> {
        self.gate.record_key(key)
    }

    /// The shared upload gate.
    pub fn gate(&self) -> &UploadGate {
        &self.gate
    }
}

impl fmt::Debug for BaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseConfig")
            .field("upload_enabled", &self.upload_enabled())
            .field("allow_multiple", &self.allow_multiple)
            .field("on_files_selected", &self.on_files_selected.is_some())
            .finish()
    }
}

impl Serialize for BaseConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BaseConfig", 2)?;
        state.serialize_field("upload_enabled", &self.upload_enabled())?;
        state.serialize_field("allow_multiple", &self.allow_multiple)?;
        state.end()
    }
}

/// Object-storage client credentials.
#[derive(Debug, Clone, Serialize)]
pub struct StorageCredentials {
    pub region: String,
    pub endpoint: String,
    pub access_key: Secret,
    pub secret_key: Secret,
}

/// Object-storage destination for this widget instance.
#[derive(Debug, Clone, Serialize)]
pub struct StorageConfig {
    /// Which logical destination was selected.
    pub destination: Destination,
    /// Bucket name for that destination.
    pub destination_bucket: String,
    pub credentials: StorageCredentials,
}

/// OneDrive picker configuration.
#[derive(Debug, Clone, Serialize)]
pub struct OneDriveConfig {
    pub client_id: String,
    /// Always false; see [`build`].
    pub allow_multi_select: bool,
}

/// Google picker configuration.
#[derive(Debug, Clone, Serialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub app_id: String,
    pub api_key: Secret,
    pub allow_multi_select: bool,
}

/// The four bundles produced for one aggregator instance.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderConfigs {
    pub base: Arc<BaseConfig>,
    pub storage: StorageConfig,
    pub one_drive: OneDriveConfig,
    pub google: GoogleConfig,
}

/// Derive all provider bundles.
///
/// - The destination bucket follows `options.is_document`, with `None`
///   treated as `false`.
/// - OneDrive multi-select is always `false`, whatever
///   `options.allow_multiple` says. Google follows the option.
pub fn build(
    secrets: EnvironmentSecrets,
    options: BuildOptions,
    gate: UploadGate,
) -> ProviderConfigs {
    let EnvironmentSecrets {
        space_secret,
        space_key,
        space_endpoint,
        space_region,
        document_space,
        image_space,
        onedrive_client_id,
        google_client_id,
        google_app_id,
        google_api_key,
    } = secrets;

    let destination = Destination::from_flag(options.is_document);
    let destination_bucket = match destination {
        Destination::Document => document_space,
        Destination::Image => image_space,
    };

    let base = Arc::new(BaseConfig {
        gate,
        on_files_selected: options.on_files_selected,
        allow_multiple: options.allow_multiple,
    });

    ProviderConfigs {
        base,
        storage: StorageConfig {
            destination,
            destination_bucket,
            credentials: StorageCredentials {
                region: space_region,
                endpoint: space_endpoint,
                access_key: space_key,
                secret_key: space_secret,
            },
        },
        // TODO: follow `allow_multiple` once the OneDrive picker's multi-select behavior is confirmed.
        one_drive: OneDriveConfig {
            client_id: onedrive_client_id,
            allow_multi_select: false,
        },
        google: GoogleConfig {
            client_id: google_client_id,
            app_id: google_app_id,
            api_key: google_api_key,
            allow_multi_select: options.allow_multiple,
        },
    }
}
