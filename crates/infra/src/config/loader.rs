//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `MESHPORT_CLIENT_ID` is not set, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `MESHPORT_CLIENT_ID`: OAuth client id (required for env loading)
//! - `MESHPORT_REDIRECT_URI`: Loopback redirect URI
//! - `MESHPORT_AUTHORIZATION_URL`: Authorization endpoint
//! - `MESHPORT_TOKEN_URL`: Token endpoint
//! - `MESHPORT_SCOPES`: Space or comma separated scopes
//! - `MESHPORT_API_BASE_URL`: Base URL for export and catalog APIs
//! - `MESHPORT_EXPORT_TYPE`: Export type, e.g. `3DTiles`
//! - `MESHPORT_POLL_INTERVAL`: Export poll interval in seconds
//! - `MESHPORT_LOG_LEVEL`: Default log filter when `RUST_LOG` is unset
//! - `MESHPORT_LOG_JSON`: JSON log output (true/false)
//!
//! Unset optional variables keep the [`Config::default`] values.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./meshport.{toml,json}` or `./config.{toml,json}` (current working
//!    directory)
//! 2. The same names one and two directories up
//! 3. Relative to executable location

use std::path::{Path, PathBuf};

use meshport_domain::{Config, MeshportError, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["meshport.toml", "meshport.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the client id is
/// not set there, falls back to loading from a config file. The result is
/// validated either way.
///
/// # Errors
/// Returns `MeshportError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A field fails validation
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)?
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// `MESHPORT_CLIENT_ID` must be present. Every other variable is optional.
///
/// # Errors
/// Returns `MeshportError::Config` if the client id is missing or a value
/// cannot be parsed.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.auth.client_id = env_var("MESHPORT_CLIENT_ID")?;

    if let Some(uri) = env_opt("MESHPORT_REDIRECT_URI") {
        config.auth.redirect_uri = uri;
    }
    if let Some(url) = env_opt("MESHPORT_AUTHORIZATION_URL") {
        config.auth.authorization_url = url;
    }
    if let Some(url) = env_opt("MESHPORT_TOKEN_URL") {
        config.auth.token_url = url;
    }
    if let Some(scopes) = env_opt("MESHPORT_SCOPES") {
        config.auth.scopes = parse_scopes(&scopes);
    }
    if let Some(base_url) = env_opt("MESHPORT_API_BASE_URL") {
        config.export.base_url.clone_from(&base_url);
        config.catalog.base_url = base_url;
    }
    if let Some(export_type) = env_opt("MESHPORT_EXPORT_TYPE") {
        config.export.export_type = export_type;
    }
    if let Some(interval) = env_opt("MESHPORT_POLL_INTERVAL") {
        config.export.poll_interval_secs = interval
            .parse::<u64>()
            .map_err(|e| MeshportError::Config(format!("Invalid poll interval: {e}")))?;
    }
    if let Some(level) = env_opt("MESHPORT_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("MESHPORT_LOG_JSON", config.logging.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `MeshportError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MeshportError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MeshportError::Config(
                "No config file found and MESHPORT_CLIENT_ID is not set".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| MeshportError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, format chosen by extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| MeshportError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MeshportError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(MeshportError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join(".."), exe_dir.join("../..")]);
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Split a scope list on whitespace and commas.
fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}

/// Get required environment variable
///
/// # Errors
/// Returns `MeshportError::Config` if the variable is not set or empty.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        MeshportError::Config(format!("Missing required environment variable: {key}"))
    })
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
