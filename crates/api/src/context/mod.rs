//! Application context - dependency injection container

use std::sync::Arc;

use meshport_core::{
    AuthOrchestrator, BrowserLauncher, CallbackListener, CatalogApi, CredentialStore, ExportApi,
    ExportOrchestrator, SettingsStore, TokenEndpoint, WorkflowSession,
};
use meshport_domain::{Config, Result};
use meshport_infra::{
    config, CatalogClient, KeychainSettingsStore, LoopbackCallbackListener, MeshExportClient,
    SystemBrowser, TokenExchangeClient,
};
use tracing::info;

/// Host-side collaborators the login flow needs
///
/// Production uses the platform keychain, a loopback listener and the system
/// browser. Tests swap in doubles.
pub struct HostPorts {
    pub settings: Arc<dyn SettingsStore>,
    pub listener: Arc<dyn CallbackListener>,
    pub browser: Arc<dyn BrowserLauncher>,
}

impl HostPorts {
    pub fn system() -> Self {
        Self {
            settings: Arc::new(KeychainSettingsStore::default()),
            listener: Arc::new(LoopbackCallbackListener),
            browser: Arc::new(SystemBrowser),
        }
    }
}

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub auth: Arc<AuthOrchestrator>,
    pub session: Arc<WorkflowSession>,
}

impl AppContext {
    /// Create a context from the environment or a probed config file.
    ///
    /// # Errors
    /// Returns `MeshportError::Config` if no valid configuration is found.
    pub fn new() -> Result<Self> {
        Self::new_with_config(config::load()?)
    }

    /// Create a context backed by the platform adapters.
    pub fn new_with_config(config: Config) -> Result<Self> {
        Self::new_with_ports(config, HostPorts::system())
    }

    /// Create a context with caller-supplied host ports.
    ///
    /// Network clients are always the real ones; point the configured base
    /// URLs at a mock server to exercise them.
    pub fn new_with_ports(config: Config, ports: HostPorts) -> Result<Self> {
        config.validate()?;

        let token_endpoint: Arc<dyn TokenEndpoint> = Arc::new(TokenExchangeClient::new(&config.auth)?);
        let export_api: Arc<dyn ExportApi> = Arc::new(MeshExportClient::from_config(&config.export)?);
        let catalog_api: Arc<dyn CatalogApi> = Arc::new(CatalogClient::from_config(&config.catalog)?);

        let credentials = Arc::new(CredentialStore::new(ports.settings, &config.auth));
        let auth = Arc::new(AuthOrchestrator::new(
            config.auth.clone(),
            credentials,
            token_endpoint,
            ports.listener,
            ports.browser,
        ));

        let exports = Arc::new(ExportOrchestrator::new(export_api, &config.export));
        let session = Arc::new(WorkflowSession::new(
            Arc::clone(&auth),
            catalog_api,
            exports,
            config.export.export_type.clone(),
        ));

        info!(
            client_id = %config.auth.client_id,
            export_type = %config.export.export_type,
            "application context initialized"
        );

        Ok(Self { config, auth, session })
    }

    /// Restore a persisted session so commands can skip the browser.
    ///
    /// Returns whether a usable session is active.
    pub async fn restore_session(&self) -> Result<bool> {
        let restored = self.auth.restore_session().await?;
        info!(restored, "session restore finished");
        Ok(restored)
    }

    /// Abort in-flight work. Listener ports and poll loops are released by
    /// cancellation; there is nothing else to flush.
    pub fn shutdown(&self) {
        info!(state = self.session.state().name(), "shutdown called on AppContext");
        self.session.cancel();
    }
}
