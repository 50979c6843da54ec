//! # Meshport Core
//!
//! Business logic for sign-in and mesh export - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for the token endpoint, loopback listener,
//!   browser, settings, export and catalog APIs
//! - The credential store and auth orchestrator
//! - The export orchestrator and its poll loop
//! - The workflow state machine and the session that drives it
//!
//! ## Architecture Principles
//! - Only depends on `meshport-common` and `meshport-domain`
//! - No HTTP, keychain or platform code
//! - All external dependencies via traits

pub mod auth;
pub mod catalog;
pub mod export;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use auth::{
    AccessTokenProvider, AuthEvent, AuthEvents, AuthOrchestrator, BrowserLauncher,
    CallbackListener, CredentialStore, PendingCallback, SettingsStore, StaticAccessToken,
    TokenEndpoint,
};
pub use catalog::CatalogApi;
pub use export::{ExportApi, ExportOrchestrator};
pub use workflow::{transition, TransitionError, WorkflowEvent, WorkflowSession};
