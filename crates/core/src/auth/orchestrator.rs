//! Login, silent refresh and logout
//!
//! One login attempt owns its PKCE parameters and its listener; both are
//! dropped when the attempt ends, whatever the outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meshport_common::auth::{verify_challenge, PkceParameters};
use meshport_domain::constants::LOGIN_TIMEOUT_SECS;
use meshport_domain::{AuthConfig, CallbackResult, MeshportError, Result, TokenSet};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::credential_store::CredentialStore;
use super::events::{AuthEvent, AuthEvents};
use super::ports::{
    AccessTokenProvider, BrowserLauncher, CallbackListener, PendingCallback, TokenEndpoint,
};

pub struct AuthOrchestrator {
    config: AuthConfig,
    credentials: Arc<CredentialStore>,
    token_endpoint: Arc<dyn TokenEndpoint>,
    listener: Arc<dyn CallbackListener>,
    browser: Arc<dyn BrowserLauncher>,
    events: AuthEvents,
    login_timeout: Duration,
    // Serializes refreshes so concurrent callers share one exchange.
    refresh_lock: Mutex<()>,
}

impl AuthOrchestrator {
    pub fn new(
        config: AuthConfig,
        credentials: Arc<CredentialStore>,
        token_endpoint: Arc<dyn TokenEndpoint>,
        listener: Arc<dyn CallbackListener>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            config,
            credentials,
            token_endpoint,
            listener,
            browser,
            events: AuthEvents::new(),
            login_timeout: Duration::from_secs(LOGIN_TIMEOUT_SECS),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Build the authorization request URL for one login attempt.
    pub fn authorization_url(&self, redirect_uri: &str, pkce: &PkceParameters) -> Result<String> {
        let mut url = Url::parse(&self.config.authorization_url).map_err(|e| {
            MeshportError::Config(format!("invalid authorization_url: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &self.config.scope_string())
            .append_pair("state", &pkce.state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", pkce.challenge_method());
        Ok(url.into())
    }

    /// Run the interactive browser login.
    ///
    /// Cancelling `cancel` or hitting the login timeout stops the listener
    /// and releases its port.
    #[instrument(skip(self, cancel), fields(client_id = %self.config.client_id))]
    pub async fn login(&self, cancel: &CancellationToken) -> Result<TokenSet> {
        self.config.validate()?;

        let pkce = PkceParameters::generate();
        let pending = self.listener.start(&self.config.redirect_uri).await?;
        let outcome = self.complete_login(pending.as_ref(), &pkce, cancel).await;
        pending.stop();

        let tokens = outcome?;
        self.credentials.save(tokens.clone()).await?;
        self.events.tokens_changed(Some(tokens.expires_at));
        self.events.connected(true);
        info!(expires_at = %tokens.expires_at, "Login complete");
        Ok(tokens)
    }

    async fn complete_login(
        &self,
        pending: &dyn PendingCallback,
        pkce: &PkceParameters,
        cancel: &CancellationToken,
    ) -> Result<TokenSet> {
        let redirect_uri = pending.redirect_uri().to_string();
        let url = self.authorization_url(&redirect_uri, pkce)?;

        debug!(redirect_uri = %redirect_uri, "Opening browser for authorization");
        self.browser.open(&url)?;

        let callback = tokio::select! {
            () = cancel.cancelled() => return Err(MeshportError::Cancelled),
            waited = tokio::time::timeout(self.login_timeout, pending.await_callback()) => {
                waited.map_err(|_| {
                    MeshportError::Network(format!(
                        "timed out after {}s waiting for the login redirect",
                        self.login_timeout.as_secs()
                    ))
                })??
            }
        };

        let code = match &callback {
            CallbackResult::Code { code, .. } => code.clone(),
            CallbackResult::Cancelled => return Err(MeshportError::Cancelled),
            CallbackResult::Error { .. } => {
                let message = callback.error_message().unwrap_or_default();
                warn!(error = %message, "Authorization redirect carried an error");
                return Err(MeshportError::Authorization(message));
            }
        };

        if !pkce.state_matches(callback.state()) {
            warn!("Authorization redirect state mismatch");
            return Err(MeshportError::Authorization(
                "state mismatch in authorization redirect".to_string(),
            ));
        }
        if !verify_challenge(&pkce.verifier, &pkce.challenge) {
            return Err(MeshportError::Internal("PKCE verifier does not match challenge".into()));
        }

        self.token_endpoint.exchange_code(&code, &pkce.verifier, &redirect_uri).await
    }

    /// Restore a persisted session, refreshing silently if it expired.
    ///
    /// Returns whether a usable session is now active.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> Result<bool> {
        let Some(tokens) = self.credentials.load().await? else {
            debug!("No stored session");
            return Ok(false);
        };

        if self.credentials.is_valid().await {
            self.events.connected(true);
            return Ok(true);
        }
        if !tokens.can_refresh() {
            debug!("Stored session expired without a refresh token");
            self.credentials.clear().await?;
            return Ok(false);
        }

        match self.refresh().await {
            Ok(_) => {
                self.events.connected(true);
                Ok(true)
            }
            Err(MeshportError::Authorization(reason)) => {
                debug!(reason = %reason, "Stored session could not be refreshed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn is_signed_in(&self) -> bool {
        self.credentials.is_valid().await || self.credentials.needs_refresh().await
    }

    /// Access token that is valid right now, refreshing once if needed.
    pub async fn access_token(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let Some(tokens) = self.credentials.current().await else {
            return Err(MeshportError::Authorization("not signed in".to_string()));
        };
        if self.credentials.is_valid().await {
            return Ok(tokens.access_token);
        }
        if !tokens.can_refresh() {
            return Err(MeshportError::Authorization("session expired; sign in again".into()));
        }

        self.refresh_with(&tokens).await.map(|fresh| fresh.access_token)
    }

    /// Force a refresh with the stored refresh token.
    pub async fn refresh(&self) -> Result<TokenSet> {
        let _guard = self.refresh_lock.lock().await;
        let Some(tokens) = self.credentials.current().await else {
            return Err(MeshportError::Authorization("not signed in".to_string()));
        };
        self.refresh_with(&tokens).await
    }

    async fn refresh_with(&self, current: &TokenSet) -> Result<TokenSet> {
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            return Err(MeshportError::Authorization("no refresh token available".into()));
        };

        debug!("Refreshing access token");
        let mut fresh = match self.token_endpoint.refresh(refresh_token).await {
            Ok(fresh) => fresh,
            Err(MeshportError::Protocol { status: Some(status @ (400 | 401)), body }) => {
                warn!(status, "Refresh token rejected; clearing session");
                self.clear_session().await?;
                return Err(MeshportError::Authorization(format!(
                    "refresh rejected ({status}): {body}"
                )));
            }
            Err(e) => return Err(e),
        };

        // Providers may omit a rotated refresh token; keep the previous one.
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = current.refresh_token.clone();
        }

        self.credentials.save(fresh.clone()).await?;
        self.events.tokens_changed(Some(fresh.expires_at));
        info!(expires_at = %fresh.expires_at, "Access token refreshed");
        Ok(fresh)
    }

    /// Sign out locally.
    pub async fn logout(&self) -> Result<()> {
        self.clear_session().await?;
        info!("Logged out");
        Ok(())
    }

    async fn clear_session(&self) -> Result<()> {
        self.credentials.clear().await?;
        self.events.tokens_changed(None);
        self.events.connected(false);
        Ok(())
    }
}

#[async_trait]
impl AccessTokenProvider for AuthOrchestrator {
    async fn access_token(&self) -> Result<String> {
        Self::access_token(self).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::testing::{FakeAuthorizationServer, InMemorySettingsStore, MockTokenEndpoint};

    struct Harness {
        server: Arc<FakeAuthorizationServer>,
        endpoint: Arc<MockTokenEndpoint>,
        orchestrator: AuthOrchestrator,
    }

    fn harness(server: FakeAuthorizationServer) -> Harness {
        let config = AuthConfig { client_id: "native-abc".into(), ..AuthConfig::default() };
        let settings = Arc::new(InMemorySettingsStore::new());
        let credentials = Arc::new(CredentialStore::new(settings, &config));
        let server = Arc::new(server);
        let endpoint = Arc::new(MockTokenEndpoint::new());
        let orchestrator = AuthOrchestrator::new(
            config,
            credentials,
            endpoint.clone(),
            server.clone(),
            server.clone(),
        );
        Harness { server, endpoint, orchestrator }
    }

    fn tokens(expires_in: i64) -> TokenSet {
        TokenSet::issued_now("access-1".into(), Some("refresh-1".into()), expires_in, None)
    }

    #[tokio::test]
    async fn login_exchanges_code_and_stores_tokens() {
        let h = harness(FakeAuthorizationServer::granting("abc"));
        h.endpoint.push_exchange(Ok(tokens(3600)));
        let mut events = h.orchestrator.subscribe();

        let result = h.orchestrator.login(&CancellationToken::new()).await.unwrap();

        assert_eq!(result.access_token, "access-1");
        assert!(h.orchestrator.credentials().is_valid().await);
        let call = h.endpoint.exchange_calls().pop().unwrap();
        assert_eq!(call.code, "abc");
        assert_eq!(call.verifier.len(), 128);
        assert_eq!(call.redirect_uri, "http://localhost:3000/signin-callback");
        assert!(h.server.was_stopped());
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::TokensChanged { .. }));
        assert_eq!(events.recv().await.unwrap(), AuthEvent::ConnectionChanged { connected: true });
    }

    #[tokio::test]
    async fn authorization_url_carries_pkce_fields() {
        let h = harness(FakeAuthorizationServer::granting("abc"));
        let pkce = PkceParameters::generate();
        let url = h.orchestrator.authorization_url("http://localhost:3000/cb", &pkce).unwrap();
        let url = Url::parse(&url).unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "native-abc");
        assert_eq!(query["redirect_uri"], "http://localhost:3000/cb");
        assert_eq!(query["scope"], "itwin-platform offline_access");
        assert_eq!(query["state"], pkce.state);
        assert_eq!(query["code_challenge"], pkce.challenge);
        assert_eq!(query["code_challenge_method"], "S256");
    }

    #[tokio::test]
    async fn callback_error_is_an_authorization_error() {
        let h = harness(FakeAuthorizationServer::denying("access_denied", "user said no"));

        let err = h.orchestrator.login(&CancellationToken::new()).await.unwrap_err();

        assert_eq!(err, MeshportError::Authorization("access_denied: user said no".into()));
        assert!(h.endpoint.exchange_calls().is_empty());
        assert!(h.server.was_stopped());
    }

    #[tokio::test]
    async fn state_mismatch_is_rejected_before_exchange() {
        let h = harness(FakeAuthorizationServer::forging_state("abc", "forged"));

        let err = h.orchestrator.login(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, MeshportError::Authorization(msg) if msg.contains("state")));
        assert!(h.endpoint.exchange_calls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_listener() {
        let h = harness(FakeAuthorizationServer::silent());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = h.orchestrator.login(&cancel).await.unwrap_err();

        assert_eq!(err, MeshportError::Cancelled);
        assert!(h.server.was_stopped());
    }

    #[tokio::test]
    async fn login_times_out() {
        let mut h = harness(FakeAuthorizationServer::silent());
        h.orchestrator = h.orchestrator.with_login_timeout(Duration::from_millis(20));

        let err = h.orchestrator.login(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, MeshportError::Network(msg) if msg.contains("timed out")));
        assert!(h.server.was_stopped());
    }

    #[tokio::test]
    async fn access_token_refreshes_expiring_session_once() {
        let h = harness(FakeAuthorizationServer::silent());
        h.orchestrator.credentials().save(tokens(30)).await.unwrap();
        h.endpoint.push_refresh(Ok(TokenSet::issued_now("access-2".into(), None, 3600, None)));

        let token = h.orchestrator.access_token().await.unwrap();
        let again = h.orchestrator.access_token().await.unwrap();

        assert_eq!(token, "access-2");
        assert_eq!(again, "access-2");
        assert_eq!(h.endpoint.refresh_calls(), vec!["refresh-1".to_string()]);
        let stored = h.orchestrator.credentials().current().await.unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn rejected_refresh_clears_session() {
        let h = harness(FakeAuthorizationServer::silent());
        h.orchestrator.credentials().save(tokens(30)).await.unwrap();
        h.endpoint.push_refresh(Err(MeshportError::protocol(400, "invalid_grant")));

        let err = h.orchestrator.access_token().await.unwrap_err();

        assert!(matches!(err, MeshportError::Authorization(_)));
        assert!(h.orchestrator.credentials().current().await.is_none());
    }

    #[tokio::test]
    async fn network_failure_during_refresh_keeps_session() {
        let h = harness(FakeAuthorizationServer::silent());
        h.orchestrator.credentials().save(tokens(30)).await.unwrap();
        h.endpoint.push_refresh(Err(MeshportError::Network("offline".into())));

        let err = h.orchestrator.access_token().await.unwrap_err();

        assert_eq!(err, MeshportError::Network("offline".into()));
        assert!(h.orchestrator.credentials().current().await.is_some());
    }

    #[tokio::test]
    async fn access_token_requires_sign_in() {
        let h = harness(FakeAuthorizationServer::silent());
        let err = h.orchestrator.access_token().await.unwrap_err();
        assert!(matches!(err, MeshportError::Authorization(_)));
    }

    #[tokio::test]
    async fn restore_session_refreshes_expired_tokens() {
        let h = harness(FakeAuthorizationServer::silent());
        let expired = TokenSet::issued_at(
            Utc::now() - chrono::Duration::hours(2),
            "old".into(),
            Some("refresh-1".into()),
            3600,
            None,
        );
        h.orchestrator.credentials().save(expired).await.unwrap();
        h.endpoint.push_refresh(Ok(tokens(3600)));

        assert!(h.orchestrator.restore_session().await.unwrap());
        assert!(h.orchestrator.credentials().is_valid().await);
    }

    #[tokio::test]
    async fn logout_clears_and_notifies() {
        let h = harness(FakeAuthorizationServer::silent());
        h.orchestrator.credentials().save(tokens(3600)).await.unwrap();
        let mut events = h.orchestrator.subscribe();

        h.orchestrator.logout().await.unwrap();

        assert!(!h.orchestrator.is_signed_in().await);
        assert_eq!(events.recv().await.unwrap(), AuthEvent::TokensChanged { expires_at: None });
        assert_eq!(events.recv().await.unwrap(), AuthEvent::ConnectionChanged { connected: false });
    }
}
