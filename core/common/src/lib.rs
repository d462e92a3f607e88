//! Common utilities and types shared across the upup modules.
//!
//! This module provides the error taxonomy and the value types exchanged
//! between the configuration core and the provider adapters.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ObjectKey, ProviderKind, RemoteFile, Secret, SelectedFile};
