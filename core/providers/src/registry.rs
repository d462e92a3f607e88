//! Adapter registry for resolving adapters by provider.

use std::collections::HashMap;
use std::sync::Arc;

use upup_common::{Error, ProviderKind, Result};
use upup_config::ProviderConfigs;

use crate::adapter::ProviderAdapter;
use crate::external::{AuthFlow, RemoteCatalog, TransferClient};
use crate::gdrive::GoogleDriveAdapter;
use crate::object_storage::ObjectStorageAdapter;
use crate::onedrive::OneDriveAdapter;

/// Factory function type for creating adapters.
pub type AdapterFactory =
    Box<dyn Fn(&ProviderConfigs) -> Result<Box<dyn ProviderAdapter>> + Send + Sync>;

/// Registry for adapter factories.
///
/// The host resolves the adapters it chooses to render, each built from
/// the matching configuration bundle.
pub struct AdapterRegistry {
    factories: HashMap<ProviderKind, AdapterFactory>,
}

impl AdapterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an adapter factory.
    ///
    /// # Errors
    /// - Returns error if the provider is already registered
    pub fn register(&mut self, provider: ProviderKind, factory: AdapterFactory) -> Result<()> {
        if self.factories.contains_key(&provider) {
            return Err(Error::AlreadyExists(format!(
                "Adapter '{}' is already registered",
                provider
            )));
        }
        self.factories.insert(provider, factory);
        Ok(())
    }

    /// Build an adapter for `provider` from the aggregator's bundles.
    ///
    /// # Errors
    /// - Provider not registered
    pub fn create(
        &self,
        provider: ProviderKind,
        configs: &ProviderConfigs,
    ) -> Result<Box<dyn ProviderAdapter>> {
        let factory = self.factories.get(&provider).ok_or_else(|| {
            Error::NotFound(format!("Adapter '{}' is not registered", provider))
        })?;
        factory(configs)
    }

    /// Registered providers, in rendering order.
    pub fn providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.factories.contains_key(kind))
            .collect()
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, provider: ProviderKind) -> bool {
        self.factories.contains_key(&provider)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// External collaborators the built-in adapters delegate to.
#[derive(Clone)]
pub struct Collaborators {
    /// Interactive OAuth flow (Google and OneDrive).
    pub auth_flow: Arc<dyn AuthFlow>,
    /// Listing over the destination bucket.
    pub storage_catalog: Arc<dyn RemoteCatalog>,
    /// Listing over the user's Google Drive.
    pub drive_catalog: Arc<dyn RemoteCatalog>,
    /// Object-storage client.
    pub transfer: Arc<dyn TransferClient>,
    /// OAuth redirect URL.
    pub redirect_url: String,
}

/// Create a registry with all three built-in adapters.
pub fn create_default_registry(collaborators: Collaborators) -> Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();

    let c = collaborators.clone();
    registry.register(
        ProviderKind::ObjectStorage,
        Box::new(move |configs: &ProviderConfigs| -> Result<Box<dyn ProviderAdapter>> {
            Ok(Box::new(ObjectStorageAdapter::new(
                configs.base.clone(),
                configs.storage.clone(),
                c.storage_catalog.clone(),
                c.transfer.clone(),
            )))
        }),
    )?;

    let c = collaborators.clone();
    registry.register(
        ProviderKind::OneDrive,
        Box::new(move |configs: &ProviderConfigs| -> Result<Box<dyn ProviderAdapter>> {
            Ok(Box::new(OneDriveAdapter::new(
                configs.one_drive.clone(),
                c.redirect_url.clone(),
                c.auth_flow.clone(),
            )))
        }),
    )?;

    let c = collaborators;
    registry.register(
        ProviderKind::GoogleDrive,
        Box::new(move |configs: &ProviderConfigs| -> Result<Box<dyn ProviderAdapter>> {
            Ok(Box::new(GoogleDriveAdapter::new(
                configs.base.clone(),
                configs.google.clone(),
                configs.storage.clone(),
                c.redirect_url.clone(),
                c.auth_flow.clone(),
                c.drive_catalog.clone(),
                c.transfer.clone(),
            )))
        }),
    )?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCatalog, MemoryTransfer, StaticAuthFlow};
    use crate::oauth::DEFAULT_REDIRECT_URL;
    use crate::state::AdapterState;
    use upup_config::{BuildOptions, MapEnv, Upup, REQUIRED_VARS};

    fn upup() -> Upup {
        let env: MapEnv = REQUIRED_VARS.iter().map(|name| (*name, "v")).collect();
        Upup::init(&env, BuildOptions::default()).unwrap()
    }

    fn collaborators() -> Collaborators {
        Collaborators {
            auth_flow: Arc::new(StaticAuthFlow::approving("token")),
            storage_catalog: Arc::new(MemoryCatalog::new(ProviderKind::ObjectStorage)),
            drive_catalog: Arc::new(MemoryCatalog::new(ProviderKind::GoogleDrive)),
            transfer: Arc::new(MemoryTransfer::new()),
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
        }
    }

    #[test]
    fn test_default_registry_builds_every_adapter() {
        let registry = create_default_registry(collaborators()).unwrap();
        let upup = upup();

        assert_eq!(registry.providers(), ProviderKind::ALL.to_vec());
        for kind in ProviderKind::ALL {
            let adapter = registry.create(kind, upup.configs()).unwrap();
            assert_eq!(adapter.kind(), kind);
            assert_eq!(adapter.state(), AdapterState::Unauthenticated);
        }
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = create_default_registry(collaborators()).unwrap();
        let result = registry.register(
            ProviderKind::OneDrive,
            Box::new(|configs: &ProviderConfigs| -> Result<Box<dyn ProviderAdapter>> {
                Ok(Box::new(OneDriveAdapter::new(
                    configs.one_drive.clone(),
                    DEFAULT_REDIRECT_URL,
                    Arc::new(StaticAuthFlow::denying()),
                )))
            }),
        );
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let registry = AdapterRegistry::new();
        assert!(!registry.has_provider(ProviderKind::GoogleDrive));
        assert!(matches!(
            registry.create(ProviderKind::GoogleDrive, upup().configs()),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_adapter_failures_are_isolated() {
        let mut c = collaborators();
        c.auth_flow = Arc::new(StaticAuthFlow::denying());
        let registry = create_default_registry(c).unwrap();
        let upup = upup();

        let mut drive = registry.create(ProviderKind::GoogleDrive, upup.configs()).unwrap();
        let mut storage = registry
            .create(ProviderKind::ObjectStorage, upup.configs())
            .unwrap();

        assert!(drive.authenticate().await.is_err());
        assert!(storage.authenticate().await.is_ok());
        assert_eq!(drive.state(), AdapterState::Unauthenticated);
        assert_eq!(storage.state(), AdapterState::Authenticated);
    }
}
