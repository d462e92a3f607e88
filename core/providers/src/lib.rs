//! Provider adapters for the upup file picker.
//!
//! This module provides a trait-based interface over the remote storage
//! backends a user can pick files from (object storage, OneDrive, Google
//! Drive) and a registry building adapters from the aggregated
//! configuration bundles.
//!
//! # Design Principles
//! - Provider isolation: a failing adapter never affects its siblings
//! - Gate first: no transfer starts while uploads are disabled
//! - Explicit stubs: unimplemented operations return `Error::Unsupported`
//! - Delegation: popups, SDK calls and transfers sit behind the traits in
//!   [`external`]

pub mod adapter;
pub mod external;
pub mod gdrive;
pub mod memory;
pub mod oauth;
pub mod object_storage;
pub mod onedrive;
pub mod registry;
pub mod state;
mod transfer;

pub use adapter::{AuthSession, FileStream, PickerContext, ProviderAdapter};
pub use external::{
    AuthFlow, AuthorizationRequest, AuthorizationResponse, ListPage, RemoteCatalog,
    TransferClient,
};
pub use gdrive::GoogleDriveAdapter;
pub use memory::{MemoryCatalog, MemoryTransfer, StaticAuthFlow};
pub use oauth::{
    complete_authorization, google_authorization_request, onedrive_authorization_request,
    DEFAULT_REDIRECT_URL,
};
pub use object_storage::ObjectStorageAdapter;
pub use onedrive::OneDriveAdapter;
pub use registry::{create_default_registry, AdapterFactory, AdapterRegistry, Collaborators};
pub use state::{AdapterState, StateMachine};
