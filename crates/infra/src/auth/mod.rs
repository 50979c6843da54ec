//! Sign-in adapters: token endpoint, loopback listener and browser

pub mod browser;
pub mod callback_server;
pub mod token_client;

pub use browser::SystemBrowser;
pub use callback_server::{ListenerError, LoopbackCallbackListener, LoopbackListener};
pub use token_client::{validate_token_response, TokenExchangeClient, TokenExchangeError, TokenResponse};
