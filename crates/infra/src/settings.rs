//! Keychain-backed settings store
//!
//! Every settings key becomes one keychain entry under a single service
//! name. Keyring calls block on the platform secret service, so they run on
//! the blocking pool.

use async_trait::async_trait;
use meshport_common::{KeychainError, KeychainProvider};
use meshport_core::SettingsStore;
use meshport_domain::{MeshportError, Result};

use crate::errors::InfraError;

pub const DEFAULT_SERVICE_NAME: &str = "Meshport.auth";

#[derive(Debug, Clone)]
pub struct KeychainSettingsStore {
    keychain: KeychainProvider,
}

impl KeychainSettingsStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { keychain: KeychainProvider::new(service_name) }
    }

    pub fn service_name(&self) -> &str {
        self.keychain.service_name()
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&KeychainProvider) -> std::result::Result<T, KeychainError> + Send + 'static,
    {
        let keychain = self.keychain.clone();
        tokio::task::spawn_blocking(move || op(&keychain))
            .await
            .map_err(|err| MeshportError::Internal(format!("keychain task failed: {err}")))?
            .map_err(|err| InfraError::from(err).into())
    }
}

impl Default for KeychainSettingsStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

#[async_trait]
impl SettingsStore for KeychainSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.blocking(move |keychain| keychain.find_secret(&key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |keychain| keychain.set_secret(&key, &value)).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |keychain| keychain.delete_secret(&key)).await
    }
}
