//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EXPORT_TYPE, DEFAULT_POLL_INTERVAL_SECS, TOKEN_REQUEST_TIMEOUT_SECS};
use crate::errors::{MeshportError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate every section that can be checked without I/O.
    ///
    /// # Errors
    /// Returns `MeshportError::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()?;
        self.export.validate()?;
        require_http_url("catalog.base_url", &self.catalog.base_url)
    }
}

/// OAuth client registration and identity provider endpoints
///
/// Read-only once loaded; supplied by the settings collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: String,
    /// Loopback redirect, e.g. `http://localhost:3000/signin-callback`. When
    /// the port is omitted an ephemeral port is chosen at login time.
    pub redirect_uri: String,
    pub authorization_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    #[serde(default = "default_token_timeout")]
    pub token_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "http://localhost:3000/signin-callback".to_string(),
            authorization_url: "https://ims.bentley.com/connect/authorize".to_string(),
            token_url: "https://ims.bentley.com/connect/token".to_string(),
            scopes: vec!["itwin-platform".to_string(), "offline_access".to_string()],
            token_timeout_secs: TOKEN_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AuthConfig {
    /// Scopes joined the way the authorization endpoint expects them.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// # Errors
    /// Returns `MeshportError::Config` for a missing client id or an endpoint
    /// that is not an http(s) URL.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(MeshportError::Config("client_id is required".to_string()));
        }
        require_http_url("redirect_uri", &self.redirect_uri)?;
        require_http_url("authorization_url", &self.authorization_url)?;
        require_http_url("token_url", &self.token_url)?;
        if self.token_timeout_secs == 0 {
            return Err(MeshportError::Config("token_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Mesh export service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub base_url: String,
    /// Versioned media type, e.g. `application/vnd.bentley.itwin-platform.v1+json`.
    pub accept_header: String,
    pub export_type: String,
    pub poll_interval_secs: u64,
    /// Upper bound on status requests for one job. `None` polls until a
    /// terminal status or cancellation.
    #[serde(default)]
    pub max_poll_attempts: Option<u32>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bentley.com".to_string(),
            accept_header: "application/vnd.bentley.itwin-platform.v1+json".to_string(),
            export_type: DEFAULT_EXPORT_TYPE.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_poll_attempts: None,
        }
    }
}

impl ExportConfig {
    /// # Errors
    /// Returns `MeshportError::Config` for an invalid base URL, empty export
    /// type or zero poll interval.
    pub fn validate(&self) -> Result<()> {
        require_http_url("export.base_url", &self.base_url)?;
        if self.export_type.trim().is_empty() {
            return Err(MeshportError::Config("export.export_type is required".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(MeshportError::Config(
                "export.poll_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Project / model directory settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub base_url: String,
    pub accept_header: String,
    pub page_size: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bentley.com".to_string(),
            accept_header: "application/vnd.bentley.itwin-platform.v1+json".to_string(),
            page_size: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

fn default_token_timeout() -> u64 {
    TOKEN_REQUEST_TIMEOUT_SECS
}

fn require_http_url(field: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .ok_or_else(|| MeshportError::Config(format!("{field} must be an http(s) URL")))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(MeshportError::Config(format!("{field} is missing a host")));
    }
    Ok(())
}
