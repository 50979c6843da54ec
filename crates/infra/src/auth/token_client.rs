//! OAuth token endpoint client
//!
//! Exchanges an authorization code (plus PKCE verifier) or a refresh token
//! for a [`TokenSet`]. Requests are form-encoded POSTs that are never
//! replayed: a second attempt with a consumed code would only fail later and
//! hide the real error.

use std::time::Duration;

use async_trait::async_trait;
use meshport_core::TokenEndpoint;
use meshport_domain::{AuthConfig, MeshportError, TokenSet};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::http::{Delivery, HttpTransport};

/// Failure taxonomy of the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenExchangeError {
    /// The request never produced a response (timeout, DNS, refused).
    #[error("token request failed: {0}")]
    Transport(String),

    /// Non-2xx from the identity provider, body kept verbatim.
    #[error("token endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    /// 2xx response we refuse to turn into tokens.
    #[error("invalid token response: {0}")]
    Validation(String),

    /// Caller passed an empty code, verifier or refresh token.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<TokenExchangeError> for MeshportError {
    fn from(value: TokenExchangeError) -> Self {
        match value {
            TokenExchangeError::Transport(message) => Self::Network(message),
            TokenExchangeError::Http { status, body } => Self::protocol(status, body),
            TokenExchangeError::Validation(message) => Self::malformed(message),
            TokenExchangeError::InvalidArgument(message) => Self::InvalidInput(message),
        }
    }
}

/// Raw token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    fn into_token_set(self) -> Result<TokenSet, TokenExchangeError> {
        let expires_in = self.expires_in;
        TokenSet::try_issued_now(self.access_token, self.refresh_token, expires_in, self.token_type)
            .ok_or_else(|| {
                TokenExchangeError::Validation(format!("expires_in out of range: {expires_in}"))
            })
    }
}

/// A response is usable only with a non-empty access token and a positive
/// lifetime.
///
/// # Errors
/// Returns [`TokenExchangeError::Validation`] describing the first problem.
pub fn validate_token_response(response: &TokenResponse) -> Result<(), TokenExchangeError> {
    if response.access_token.is_empty() {
        return Err(TokenExchangeError::Validation("access_token is empty".into()));
    }
    if response.expires_in <= 0 {
        return Err(TokenExchangeError::Validation(format!(
            "expires_in must be positive, got {}",
            response.expires_in
        )));
    }
    Ok(())
}

/// Token endpoint client bound to one client registration
#[derive(Clone)]
pub struct TokenExchangeClient {
    http: HttpTransport,
    token_url: String,
    client_id: String,
}

impl TokenExchangeClient {
    /// # Errors
    /// Returns `MeshportError::Config` if the HTTP client cannot be built.
    pub fn new(config: &AuthConfig) -> Result<Self, MeshportError> {
        let http = HttpTransport::new(Duration::from_secs(config.token_timeout_secs))?;

        Ok(Self { http, token_url: config.token_url.clone(), client_id: config.client_id.clone() })
    }

    /// `grant_type=authorization_code` exchange.
    ///
    /// # Errors
    /// See [`TokenExchangeError`].
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet, TokenExchangeError> {
        require("code", code)?;
        require("code_verifier", verifier)?;
        require("redirect_uri", redirect_uri)?;
        debug!(code_len = code.len(), verifier_len = verifier.len(), "Exchanging authorization code");

        self.post_form(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier),
        ])
        .await
    }

    /// `grant_type=refresh_token` exchange.
    ///
    /// # Errors
    /// See [`TokenExchangeError`].
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, TokenExchangeError> {
        require("refresh_token", refresh_token)?;
        debug!("Refreshing access token");

        self.post_form(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenSet, TokenExchangeError> {
        require("client_id", &self.client_id)?;

        let request = self
            .http
            .request(Method::POST, &self.token_url)
            .header(ACCEPT, "application/json")
            .form(form);

        let response = self
            .http
            .send(request, Delivery::Once)
            .await
            .map_err(|err| TokenExchangeError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TokenExchangeError::Transport(format!("failed to read body: {err}")))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Token endpoint rejected request");
            return Err(TokenExchangeError::Http { status: status.as_u16(), body });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|err| TokenExchangeError::Validation(format!("malformed JSON: {err}")))?;
        validate_token_response(&parsed)?;

        debug!(
            expires_in = parsed.expires_in,
            has_refresh_token = parsed.refresh_token.is_some(),
            "Token endpoint issued tokens"
        );
        parsed.into_token_set()
    }
}

#[async_trait]
impl TokenEndpoint for TokenExchangeClient {
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> meshport_domain::Result<TokenSet> {
        Ok(self.exchange_code(code, verifier, redirect_uri).await?)
    }

    async fn refresh(&self, refresh_token: &str) -> meshport_domain::Result<TokenSet> {
        Ok(self.refresh_token(refresh_token).await?)
    }
}

fn require(name: &str, value: &str) -> Result<(), TokenExchangeError> {
    if value.trim().is_empty() {
        return Err(TokenExchangeError::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(())
}
