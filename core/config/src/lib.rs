//! Configuration aggregation for the upup file picker.
//!
//! This module validates the environment-supplied provider secrets once,
//! derives one strongly-typed configuration bundle per provider, and owns
//! the shared upload gate and key log every provider adapter reports to.
//!
//! # Design Principles
//! - Fail fast: a missing variable aborts initialization with every missing name
//! - Pure derivation: bundles are computed once and never change afterwards
//! - Single owner: only the gate mutates the upload flag and the key log

pub mod aggregator;
pub mod builder;
pub mod env;
pub mod gate;

pub use aggregator::Upup;
pub use builder::{
    build, BaseConfig, BuildOptions, Destination, FilesSelectedCallback, GoogleConfig,
    OneDriveConfig, ProviderConfigs, StorageConfig, StorageCredentials,
};
pub use env::{EnvSource, EnvironmentSecrets, MapEnv, ProcessEnv, REQUIRED_VARS};
pub use gate::{GateEvent, UploadGate, EVENT_JOURNAL_CAPACITY};
