//! Bearer-authenticated JSON client for the platform REST APIs
//!
//! Every request carries `Authorization: Bearer <token>` and the versioned
//! `Accept` media type. Non-2xx responses become `MeshportError::Protocol`
//! with the raw status and body; bodies that do not match the expected shape
//! become `Protocol` errors without a status.

use std::time::Duration;

use meshport_domain::{MeshportError, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::http::{Delivery, HttpTransport, READ_ATTEMPTS};

/// Configuration for [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL without trailing slash, e.g. `https://api.bentley.com`
    pub base_url: String,
    /// Versioned media type sent as `Accept`
    pub accept: String,
    pub timeout: Duration,
    /// Total attempts for idempotent reads
    pub read_attempts: u32,
    /// Pause before the first repeated read, grows per attempt
    pub read_backoff: Duration,
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>, accept: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            accept: accept.into(),
            timeout: Duration::from_secs(30),
            read_attempts: READ_ATTEMPTS,
            read_backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: HttpTransport,
    config: ApiClientConfig,
}

impl ApiClient {
    /// # Errors
    /// Returns `MeshportError::Config` if the HTTP client cannot be built.
    pub fn new(config: ApiClientConfig) -> Result<Self> {
        let http = HttpTransport::new(config.timeout)?
            .with_read_retries(config.read_attempts, config.read_backoff);
        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// GET `path` with optional query pairs. Retried on 5xx and transport
    /// failures.
    #[instrument(skip(self, token, query), fields(path = %path))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "GET request");

        let request = self.authorized(Method::GET, &url, token)?.query(query);
        let response = self.http.send(request, Delivery::Read).await?;
        decode(response, &url).await
    }

    /// POST a JSON body. Sent once; creating a resource is not replayed.
    #[instrument(skip(self, token, body), fields(path = %path))]
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!(url = %url, "POST request");

        let request = self.authorized(Method::POST, &url, token)?.json(body);
        let response = self.http.send(request, Delivery::Once).await?;
        decode(response, &url).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, method: Method, url: &str, token: &str) -> Result<RequestBuilder> {
        if token.is_empty() {
            return Err(MeshportError::InvalidInput("access token is empty".into()));
        }
        Ok(self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, &self.config.accept))
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| MeshportError::Network(format!("failed to read response body: {err}")))?;

    if !status.is_success() {
        warn!(status = status.as_u16(), url = %url, "API returned non-success status");
        return Err(map_status_error(status, body));
    }

    // 204/205 carry no body by RFC
    let body = if body.trim().is_empty()
        && (status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT)
    {
        "null".to_string()
    } else {
        body
    };

    serde_json::from_str(&body).map_err(|err| {
        MeshportError::malformed(format!("unexpected response from {url}: {err}: {}", snippet(&body)))
    })
}

fn map_status_error(status: StatusCode, body: String) -> MeshportError {
    MeshportError::protocol(status.as_u16(), body)
}

fn snippet(body: &str) -> &str {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}
