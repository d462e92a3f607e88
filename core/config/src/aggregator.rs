//! Configuration aggregator.
//!
//! [`Upup`] is what the host constructs once per mounted widget: it
//! validates the environment, derives the provider bundles and owns the
//! upload gate for the widget's lifetime.

use std::sync::Arc;

use tracing::info;

use upup_common::Result;

use crate::builder::{
    build, BaseConfig, BuildOptions, GoogleConfig, OneDriveConfig, ProviderConfigs,
    StorageConfig,
};
use crate::env::{EnvSource, EnvironmentSecrets, ProcessEnv};
use crate::gate::UploadGate;

/// One initialized widget instance.
#[derive(Debug, Clone)]
pub struct Upup {
    gate: UploadGate,
    configs: ProviderConfigs,
}

impl Upup {
    /// Validate the environment and derive every bundle.
    ///
    /// # Errors
    /// - `Error::Configuration` if any required variable is missing; no
    ///   bundle is produced
    pub fn init(source: &dyn EnvSource, options: BuildOptions) -> Result<Self> {
        let secrets = EnvironmentSecrets::from_env(source)?;
        let gate = UploadGate::new();
        let configs = build(secrets, options, gate.clone());

        info!(
            destination = ?configs.storage.destination,
            bucket = %configs.storage.destination_bucket,
            allow_multiple = configs.base.allow_multiple(),
            "Upload widget initialized"
        );

        Ok(Self { gate, configs })
    }

    /// Initialize from the process environment.
    pub fn from_process_env(options: BuildOptions) -> Result<Self> {
        Self::init(&ProcessEnv, options)
    }

    /// Shared base configuration.
    pub fn base_config(&self) -> Arc<BaseConfig> {
        self.configs.base.clone()
    }

    /// Object-storage configuration.
    pub fn storage_config(&self) -> &StorageConfig {
        &self.configs.storage
    }

    /// OneDrive configuration.
    pub fn one_drive_config(&self) -> &OneDriveConfig {
        &self.configs.one_drive
    }

    /// Google configuration.
    pub fn google_config(&self) -> &GoogleConfig {
        &self.configs.google
    }

    /// All four bundles.
    pub fn configs(&self) -> &ProviderConfigs {
        &self.configs
    }

    /// Keys of completed uploads, in completion order.
    pub fn keys(&self) -> Vec<String> {
        self.gate.keys()
    }

    /// Open or close the upload gate.
    pub fn set_upload_enabled(&self, enabled: bool) {
        self.gate.set_enabled(enabled);
    }

    /// Update the upload flag from its previous value.
    pub fn update_upload_enabled<F>(&self, f: F)
    where
        F: FnOnce(bool) -> bool,
    {
        self.gate.update(f);
    }

    /// The upload gate owned by this instance.
    pub fn gate(&self) -> &UploadGate {
        &self.gate
    }
}
