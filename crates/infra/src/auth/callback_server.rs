//! Loopback HTTP listener that catches the OAuth redirect
//!
//! The listener binds the host/port named by the redirect URI (an ephemeral
//! port when the URI has none), serves the redirect path on a background
//! task, and hands the first request's query to a single waiter through a
//! oneshot channel. Later requests get a rejection page. Every request is
//! answered with a fixed HTML page before the connection closes.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use meshport_core::{CallbackListener, PendingCallback};
use meshport_domain::{CallbackResult, MeshportError};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::{Host, Url};

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Complete</title></head>
<body><h1>Sign-in Successful</h1><p>You can close this window and return to the application.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Failed</title></head>
<body><h1>Sign-in Failed</h1><p>The identity provider did not return an authorization code. You can close this window.</p></body>
</html>"#;

const ALREADY_COMPLETED_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign-in Already Completed</title></head>
<body><h1>Sign-in Already Completed</h1><p>This sign-in request was already handled. You can close this window.</p></body>
</html>"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListenerError {
    #[error("invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    #[error("failed to bind loopback listener: {0}")]
    Bind(String),

    #[error("callback was already awaited")]
    AlreadyAwaited,
}

impl From<ListenerError> for MeshportError {
    fn from(value: ListenerError) -> Self {
        match value {
            ListenerError::InvalidRedirectUri(message) => Self::Config(message),
            ListenerError::Bind(message) => Self::Network(message),
            ListenerError::AlreadyAwaited => Self::Internal(value.to_string()),
        }
    }
}

#[derive(Clone)]
struct CallbackState {
    path: Arc<str>,
    sender: Arc<StdMutex<Option<oneshot::Sender<CallbackResult>>>>,
}

impl CallbackState {
    /// Hand the result to the waiter. `false` once a result was delivered.
    fn deliver(&self, result: CallbackResult) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            // A dropped receiver still consumes the slot.
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }
}

const SERVER_STOPPED: &str = "loopback listener stopped unexpectedly";

/// Single-use loopback listener bound for one login attempt.
pub struct LoopbackListener {
    redirect_uri: String,
    local_addr: SocketAddr,
    receiver: StdMutex<Option<oneshot::Receiver<CallbackResult>>>,
    stop: CancellationToken,
    handle: StdMutex<Option<JoinHandle<()>>>,
}

impl LoopbackListener {
    /// Parse `redirect_uri`, bind its port and start serving.
    ///
    /// # Errors
    /// [`ListenerError::InvalidRedirectUri`] for anything that is not an
    /// `http` URI on a loopback host, [`ListenerError::Bind`] when the port
    /// is taken.
    pub async fn start(redirect_uri: &str) -> Result<Self, ListenerError> {
        let mut url = Url::parse(redirect_uri)
            .map_err(|err| ListenerError::InvalidRedirectUri(format!("{redirect_uri}: {err}")))?;
        if url.scheme() != "http" {
            return Err(ListenerError::InvalidRedirectUri(format!(
                "{redirect_uri}: loopback redirect must use http"
            )));
        }
        let ip = loopback_ip(&url)?;
        let requested_port = url.port().unwrap_or(0);

        let listener = TcpListener::bind((ip, requested_port))
            .await
            .map_err(|err| ListenerError::Bind(format!("{ip}:{requested_port}: {err}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| ListenerError::Bind(format!("failed to determine port: {err}")))?;

        if url.port().is_none() {
            url.set_port(Some(local_addr.port())).map_err(|()| {
                ListenerError::InvalidRedirectUri(format!("{redirect_uri}: cannot carry a port"))
            })?;
        }

        let (sender, receiver) = oneshot::channel();
        let state = CallbackState {
            path: Arc::from(url.path()),
            sender: Arc::new(StdMutex::new(Some(sender))),
        };
        let app = Router::new().fallback(handle_callback).with_state(state);

        let stop = CancellationToken::new();
        let shutdown = stop.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) =
                axum::serve(listener, app).with_graceful_shutdown(shutdown.cancelled_owned()).await
            {
                error!(error = %err, "Loopback callback server error");
            }
        });

        info!(port = local_addr.port(), path = url.path(), "Loopback listener bound");

        Ok(Self {
            redirect_uri: url.to_string(),
            local_addr,
            receiver: StdMutex::new(Some(receiver)),
            stop,
            handle: StdMutex::new(Some(handle)),
        })
    }

    /// Redirect URI with the bound port filled in.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the first redirect, or [`CallbackResult::Cancelled`] once
    /// [`LoopbackListener::stop`] runs. A server task that ends on its own
    /// resolves to an error result.
    ///
    /// # Errors
    /// [`ListenerError::AlreadyAwaited`] on the second call.
    pub async fn await_callback(&self) -> Result<CallbackResult, ListenerError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ListenerError::AlreadyAwaited)?;

        let result = tokio::select! {
            biased;
            received = receiver => received.unwrap_or_else(|_| {
                error!(port = self.local_addr.port(), "Loopback server ended before any redirect");
                CallbackResult::failure(SERVER_STOPPED)
            }),
            () = self.stop.cancelled() => CallbackResult::Cancelled,
        };
        Ok(result)
    }

    /// Stop accepting connections and wake the waiter. Idempotent.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            debug!(port = self.local_addr.port(), "Stopping loopback listener");
            self.stop.cancel();
        }
    }

    /// Stop and wait until the port is released.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(error = %err, "Loopback callback server panicked");
                }
            }
        }
    }
}

impl Drop for LoopbackListener {
    fn drop(&mut self) {
        self.stop.cancel();
        let handle = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET || uri.path() != &*state.path {
        debug!(%method, path = uri.path(), "Ignoring request outside the redirect path");
        return StatusCode::NOT_FOUND.into_response();
    }

    let result = parse_callback(uri.query());
    let success = result.is_success();

    if !state.deliver(result) {
        warn!("Rejecting repeated sign-in redirect");
        return (StatusCode::CONFLICT, Html(ALREADY_COMPLETED_PAGE)).into_response();
    }

    if success {
        info!("Authorization code received");
        Html(SUCCESS_PAGE).into_response()
    } else {
        warn!("Sign-in redirect carried no authorization code");
        Html(FAILURE_PAGE).into_response()
    }
}

fn parse_callback(query: Option<&str>) -> CallbackResult {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.unwrap_or("").as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    CallbackResult::from_query(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
}

fn loopback_ip(url: &Url) -> Result<IpAddr, ListenerError> {
    match url.host() {
        Some(Host::Domain("localhost")) => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        Some(Host::Ipv4(ip)) if ip.is_loopback() => Ok(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => Ok(IpAddr::V6(ip)),
        _ => Err(ListenerError::InvalidRedirectUri(format!(
            "{url}: redirect host must be a loopback address"
        ))),
    }
}

/// [`CallbackListener`] that starts a [`LoopbackListener`] per login.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopbackCallbackListener;

#[async_trait]
impl CallbackListener for LoopbackCallbackListener {
    async fn start(&self, redirect_uri: &str) -> meshport_domain::Result<Box<dyn PendingCallback>> {
        let listener = LoopbackListener::start(redirect_uri).await?;
        Ok(Box::new(listener))
    }
}

#[async_trait]
impl PendingCallback for LoopbackListener {
    fn redirect_uri(&self) -> &str {
        Self::redirect_uri(self)
    }

    async fn await_callback(&self) -> meshport_domain::Result<CallbackResult> {
        Ok(Self::await_callback(self).await?)
    }

    fn stop(&self) {
        Self::stop(self);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::Client;

    use super::*;

    fn http() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    async fn start() -> LoopbackListener {
        LoopbackListener::start("http://127.0.0.1/signin-callback").await.unwrap()
    }

    #[tokio::test]
    async fn delivers_code_and_state() {
        let listener = start().await;
        let url = format!("{}?code=abc&state=xyz", listener.redirect_uri());

        let response = http().get(&url).send().await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));
        assert!(response.text().await.unwrap().contains("Successful"));
        assert_eq!(
            listener.await_callback().await.unwrap(),
            CallbackResult::Code { code: "abc".into(), state: Some("xyz".into()) }
        );
    }

    #[tokio::test]
    async fn error_parameters_produce_error_result() {
        let listener = start().await;
        let url = format!(
            "{}?error=access_denied&error_description=user%20said%20no",
            listener.redirect_uri()
        );

        let response = http().get(&url).send().await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.text().await.unwrap().contains("Failed"));
        assert_eq!(
            listener.await_callback().await.unwrap(),
            CallbackResult::Error {
                error: "access_denied".into(),
                description: Some("user said no".into()),
                state: None,
            }
        );
    }

    #[tokio::test]
    async fn bare_redirect_is_an_error_result() {
        let listener = start().await;

        http().get(listener.redirect_uri()).send().await.unwrap();

        let result = listener.await_callback().await.unwrap();
        assert_eq!(result.error(), Some(CallbackResult::NO_CODE_OR_ERROR));
    }

    #[tokio::test]
    async fn only_the_first_redirect_counts() {
        let listener = start().await;
        let client = http();

        client.get(format!("{}?code=first", listener.redirect_uri())).send().await.unwrap();
        let second =
            client.get(format!("{}?code=second", listener.redirect_uri())).send().await.unwrap();

        assert_eq!(second.status(), reqwest::StatusCode::CONFLICT);
        assert_eq!(listener.await_callback().await.unwrap().code(), Some("first"));
    }

    #[tokio::test]
    async fn other_paths_do_not_resolve_the_wait() {
        let listener = start().await;
        let favicon = format!("http://{}/favicon.ico", listener.local_addr());

        let response = http().get(&favicon).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let waited =
            tokio::time::timeout(Duration::from_millis(50), listener.await_callback()).await;
        assert!(waited.is_err(), "wait should still be pending");
    }

    #[tokio::test]
    async fn stop_wakes_waiter_with_cancelled() {
        let listener = Arc::new(start().await);
        let waiter = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.await_callback().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        listener.stop();
        listener.stop();

        assert_eq!(waiter.await.unwrap().unwrap(), CallbackResult::Cancelled);
    }

    #[tokio::test]
    async fn server_ending_early_is_an_error_result() {
        let listener = start().await;
        let handle = listener.handle.lock().unwrap().take().unwrap();
        handle.abort();
        let _ = handle.await;

        let result = listener.await_callback().await.unwrap();

        assert_eq!(result.error(), Some(SERVER_STOPPED));
        assert!(result.code().is_none());
    }

    #[tokio::test]
    async fn second_await_is_rejected() {
        let listener = start().await;
        http().get(format!("{}?code=abc", listener.redirect_uri())).send().await.unwrap();

        listener.await_callback().await.unwrap();

        assert_eq!(listener.await_callback().await, Err(ListenerError::AlreadyAwaited));
    }

    #[tokio::test]
    async fn ephemeral_port_is_reported_in_redirect_uri() {
        let listener = LoopbackListener::start("http://localhost/signin-callback").await.unwrap();

        let expected = format!("http://localhost:{}/signin-callback", listener.local_addr().port());
        assert_eq!(listener.redirect_uri(), expected);
        assert_ne!(listener.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn shutdown_releases_the_port() {
        let listener = start().await;
        let addr = listener.local_addr();

        listener.shutdown().await;

        std::net::TcpListener::bind(addr).expect("port should be free after shutdown");
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = LoopbackListener::start(&format!("http://127.0.0.1:{port}/cb")).await.err();

        assert!(matches!(err, Some(ListenerError::Bind(_))));
        assert!(matches!(MeshportError::from(err.unwrap()), MeshportError::Network(_)));
    }

    #[tokio::test]
    async fn malformed_or_remote_uris_are_rejected() {
        for uri in ["not a uri", "https://127.0.0.1/cb", "http://example.com/cb"] {
            let err = LoopbackListener::start(uri).await.err();
            assert!(
                matches!(err, Some(ListenerError::InvalidRedirectUri(_))),
                "{uri} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn port_adapter_round_trips_through_trait_objects() {
        let pending = LoopbackCallbackListener.start("http://127.0.0.1/cb").await.unwrap();
        let url = format!("{}?code=c1&state=s1", pending.redirect_uri());

        http().get(&url).send().await.unwrap();

        assert_eq!(pending.await_callback().await.unwrap().state(), Some("s1"));
        pending.stop();
    }
}
