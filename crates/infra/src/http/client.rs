//! reqwest transport shared by the token endpoint and platform clients
//!
//! Catalog listings and export status reads may be repeated when the
//! platform answers 5xx or the connection drops. Token exchanges and export
//! creation are sent exactly once.

use std::time::Duration;

use meshport_domain::MeshportError;
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::errors::InfraError;

/// Attempts for a [`Delivery::Read`], the first try included.
pub const READ_ATTEMPTS: u32 = 3;

const READ_BACKOFF: Duration = Duration::from_millis(200);

/// Whether a request may be replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Idempotent read, repeated on 5xx or transport failure.
    Read,
    /// Consumes a code or creates a job; never repeated.
    Once,
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    read_attempts: u32,
    backoff: Duration,
}

impl HttpTransport {
    /// # Errors
    /// Returns `MeshportError::Config` if the TLS backend cannot be set up.
    pub fn new(timeout: Duration) -> Result<Self, MeshportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("meshport/", env!("CARGO_PKG_VERSION")))
            .no_proxy()
            .build()
            .map_err(|err| MeshportError::from(InfraError::from(err)))?;

        Ok(Self { client, read_attempts: READ_ATTEMPTS, backoff: READ_BACKOFF })
    }

    /// Override the read retry budget; `1` disables retries.
    #[must_use]
    pub fn with_read_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.read_attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// # Errors
    /// `MeshportError::Network` when no response arrives. A 5xx on the
    /// final read attempt is returned as a response, not an error.
    pub async fn send(
        &self,
        request: RequestBuilder,
        delivery: Delivery,
    ) -> Result<Response, MeshportError> {
        let attempts = match delivery {
            Delivery::Read => self.read_attempts,
            Delivery::Once => 1,
        };

        let mut attempt = 1;
        loop {
            let outcome = match request.try_clone() {
                Some(pending) if attempt < attempts => pending.send().await,
                _ => return self.last_attempt(request, attempt).await,
            };

            match outcome {
                Ok(response) if response.status().is_server_error() => {
                    warn!(attempt, status = response.status().as_u16(), "Platform busy, retrying read");
                }
                Ok(response) => return Ok(response),
                Err(err) if err.is_connect() || err.is_timeout() => {
                    warn!(attempt, error = %err, "Read failed in transit, retrying");
                }
                Err(err) => return Err(InfraError::from(err).into()),
            }

            tokio::time::sleep(self.backoff * attempt).await;
            attempt += 1;
        }
    }

    async fn last_attempt(
        &self,
        request: RequestBuilder,
        attempt: u32,
    ) -> Result<Response, MeshportError> {
        let response = request.send().await.map_err(InfraError::from)?;
        debug!(attempt, status = response.status().as_u16(), "HTTP response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use reqwest::StatusCode;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5))
            .unwrap()
            .with_read_retries(READ_ATTEMPTS, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn read_is_repeated_until_the_platform_recovers() {
        let server = MockServer::start().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        Mock::given(method("GET"))
            .respond_with(move |_: &wiremock::Request| -> ResponseTemplate {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let http = transport();
        let response =
            http.send(http.request(Method::GET, &server.uri()), Delivery::Read).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn read_gives_up_with_the_last_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(u64::from(READ_ATTEMPTS))
            .mount(&server)
            .await;

        let http = transport();
        let response =
            http.send(http.request(Method::GET, &server.uri()), Delivery::Read).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn once_is_never_replayed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let http = transport();
        let response =
            http.send(http.request(Method::POST, &server.uri()), Delivery::Once).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let http = transport();
        let response =
            http.send(http.request(Method::GET, &server.uri()), Delivery::Read).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let http = transport();
        let err = http
            .send(http.request(Method::GET, &format!("http://{addr}/itwins/")), Delivery::Read)
            .await
            .unwrap_err();

        assert!(matches!(err, MeshportError::Network(_)));
    }
}
