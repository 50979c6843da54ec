//! Port interfaces for the login flow
//!
//! These traits define the boundaries between the auth orchestrator and
//! the network, browser and settings implementations in infra.

use async_trait::async_trait;
use meshport_domain::{CallbackResult, Result, TokenSet};

/// OAuth token endpoint
///
/// Implementations reject empty arguments before any network call and only
/// return token sets whose access token is non-empty and whose lifetime is
/// positive.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code plus PKCE verifier for tokens.
    ///
    /// `redirect_uri` must be the exact URI the browser was sent back to.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet>;

    /// Obtain a new token set from a refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet>;
}

/// Factory for single-use loopback listeners
#[async_trait]
pub trait CallbackListener: Send + Sync {
    /// Bind a listener for `redirect_uri`.
    ///
    /// Fails with a `Config` error for a malformed URI and a `Network` error
    /// when the port cannot be bound.
    async fn start(&self, redirect_uri: &str) -> Result<Box<dyn PendingCallback>>;
}

/// A bound listener waiting for exactly one redirect
#[async_trait]
pub trait PendingCallback: Send + Sync {
    /// Redirect URI the listener actually serves (the bound port is filled in
    /// when the configured URI had none).
    fn redirect_uri(&self) -> &str;

    /// Wait for the redirect. Resolves with `CallbackResult::Cancelled` when
    /// `stop` runs first. A second call is an error.
    async fn await_callback(&self) -> Result<CallbackResult>;

    /// Release the port and wake any waiter. Safe to call repeatedly.
    fn stop(&self);
}

/// Opens the authorization URL in the user's browser
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Key/value persistence owned by the host application
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Source of a bearer token that is valid at the moment it is returned
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed bearer token, for callers that manage credentials themselves
#[derive(Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticAccessToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
