//! Authentication: credential store, login orchestration and events

pub mod credential_store;
pub mod events;
pub mod orchestrator;
pub mod ports;

pub use credential_store::CredentialStore;
pub use events::{AuthEvent, AuthEvents};
pub use orchestrator::AuthOrchestrator;
pub use ports::{
    AccessTokenProvider, BrowserLauncher, CallbackListener, PendingCallback, SettingsStore,
    StaticAccessToken, TokenEndpoint,
};
