//! # Meshport Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - HTTP transport with bounded read retries
//! - OAuth token endpoint client and the loopback callback listener
//! - Keychain-backed settings store and the system browser launcher
//! - Mesh export and catalog API clients
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `meshport-core`
//! - Depends on `meshport-common` and `meshport-domain`
//! - Contains all "impure" code (network, keychain, browser)

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod settings;

// Re-export commonly used items
pub use api::{ApiClient, CatalogClient, MeshExportClient};
pub use auth::{
    ListenerError, LoopbackCallbackListener, LoopbackListener, SystemBrowser, TokenExchangeClient,
    TokenExchangeError,
};
pub use errors::InfraError;
pub use http::{Delivery, HttpTransport};
pub use observability::init_tracing;
pub use settings::KeychainSettingsStore;
