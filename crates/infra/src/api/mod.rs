//! Platform REST API clients
//!
//! [`ApiClient`] owns the bearer/accept headers and status mapping; the
//! export and catalog clients implement the core ports on top of it.

pub mod catalog;
pub mod client;
pub mod export;

pub use catalog::CatalogClient;
pub use client::{ApiClient, ApiClientConfig};
pub use export::MeshExportClient;
