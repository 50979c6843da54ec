//! In-memory test doubles for the core ports
//!
//! Available to this crate's tests and, with the `test-utils` feature, to
//! downstream crates.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use meshport_domain::{
    CallbackResult, Changeset, ExportJob, ExportRequest, ExportStatus, MeshportError, Model,
    Project, Result, TokenSet,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::{
    BrowserLauncher, CallbackListener, PendingCallback, SettingsStore, TokenEndpoint,
};
use crate::catalog::CatalogApi;
use crate::export::ExportApi;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build an export job fixture.
pub fn export_job(id: &str, status: ExportStatus, href: Option<&str>) -> ExportJob {
    ExportJob {
        id: id.to_string(),
        status,
        display_name: Some(format!("{id} mesh")),
        download_href: href.map(String::from),
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Token endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeCall {
    pub code: String,
    pub verifier: String,
    pub redirect_uri: String,
}

/// Token endpoint answering from scripted queues
#[derive(Default)]
pub struct MockTokenEndpoint {
    exchanges: Mutex<VecDeque<Result<TokenSet>>>,
    refreshes: Mutex<VecDeque<Result<TokenSet>>>,
    exchange_calls: Mutex<Vec<ExchangeCall>>,
    refresh_calls: Mutex<Vec<String>>,
}

impl MockTokenEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_exchange(&self, result: Result<TokenSet>) {
        lock(&self.exchanges).push_back(result);
    }

    pub fn push_refresh(&self, result: Result<TokenSet>) {
        lock(&self.refreshes).push_back(result);
    }

    pub fn exchange_calls(&self) -> Vec<ExchangeCall> {
        lock(&self.exchange_calls).clone()
    }

    pub fn refresh_calls(&self) -> Vec<String> {
        lock(&self.refresh_calls).clone()
    }
}

#[async_trait]
impl TokenEndpoint for MockTokenEndpoint {
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenSet> {
        lock(&self.exchange_calls).push(ExchangeCall {
            code: code.to_string(),
            verifier: verifier.to_string(),
            redirect_uri: redirect_uri.to_string(),
        });
        lock(&self.exchanges)
            .pop_front()
            .unwrap_or_else(|| Err(MeshportError::Internal("no scripted exchange".into())))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        lock(&self.refresh_calls).push(refresh_token.to_string());
        lock(&self.refreshes)
            .pop_front()
            .unwrap_or_else(|| Err(MeshportError::Internal("no scripted refresh".into())))
    }
}

// ---------------------------------------------------------------------------
// Browser + loopback listener
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Redirect {
    Code(String),
    ForgedState { code: String, state: String },
    Error { error: String, description: String },
    Silent,
    Abandoned,
}

/// Stands in for both the browser and the identity provider.
///
/// Opening the authorization URL immediately "redirects" back to the pending
/// listener, echoing the `state` parameter unless told to forge it.
pub struct FakeAuthorizationServer {
    redirect: Redirect,
    pending: Arc<Mutex<Option<oneshot::Sender<CallbackResult>>>>,
    opened: Mutex<Vec<String>>,
    stopped: Arc<AtomicBool>,
    starts: AtomicUsize,
}

impl FakeAuthorizationServer {
    fn with(redirect: Redirect) -> Self {
        Self {
            redirect,
            pending: Arc::new(Mutex::new(None)),
            opened: Mutex::new(Vec::new()),
            stopped: Arc::new(AtomicBool::new(false)),
            starts: AtomicUsize::new(0),
        }
    }

    /// Grants `code` for whatever state was requested.
    pub fn granting(code: &str) -> Self {
        Self::with(Redirect::Code(code.to_string()))
    }

    pub fn forging_state(code: &str, state: &str) -> Self {
        Self::with(Redirect::ForgedState { code: code.to_string(), state: state.to_string() })
    }

    pub fn denying(error: &str, description: &str) -> Self {
        Self::with(Redirect::Error {
            error: error.to_string(),
            description: description.to_string(),
        })
    }

    /// Never redirects; the login waits until cancelled or timed out.
    pub fn silent() -> Self {
        Self::with(Redirect::Silent)
    }

    /// The listener goes away without a redirect or a user cancel.
    pub fn abandoning() -> Self {
        Self::with(Redirect::Abandoned)
    }

    pub fn opened_urls(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl BrowserLauncher for FakeAuthorizationServer {
    fn open(&self, url: &str) -> Result<()> {
        lock(&self.opened).push(url.to_string());

        let requested_state = Url::parse(url).ok().and_then(|url| {
            url.query_pairs().find(|(key, _)| key == "state").map(|(_, value)| value.into_owned())
        });

        let result = match &self.redirect {
            Redirect::Code(code) => {
                CallbackResult::Code { code: code.clone(), state: requested_state }
            }
            Redirect::ForgedState { code, state } => {
                CallbackResult::Code { code: code.clone(), state: Some(state.clone()) }
            }
            Redirect::Error { error, description } => CallbackResult::Error {
                error: error.clone(),
                description: Some(description.clone()),
                state: requested_state,
            },
            Redirect::Silent => return Ok(()),
            Redirect::Abandoned => CallbackResult::Cancelled,
        };

        if let Some(sender) = lock(&self.pending).take() {
            let _ = sender.send(result);
        }
        Ok(())
    }
}

#[async_trait]
impl CallbackListener for FakeAuthorizationServer {
    async fn start(&self, redirect_uri: &str) -> Result<Box<dyn PendingCallback>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = oneshot::channel();
        *lock(&self.pending) = Some(sender);

        Ok(Box::new(FakePendingCallback {
            redirect_uri: redirect_uri.to_string(),
            receiver: Mutex::new(Some(receiver)),
            stop: CancellationToken::new(),
            stopped: Arc::clone(&self.stopped),
        }))
    }
}

struct FakePendingCallback {
    redirect_uri: String,
    receiver: Mutex<Option<oneshot::Receiver<CallbackResult>>>,
    stop: CancellationToken,
    stopped: Arc<AtomicBool>,
}

#[async_trait]
impl PendingCallback for FakePendingCallback {
    fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    async fn await_callback(&self) -> Result<CallbackResult> {
        let receiver = lock(&self.receiver)
            .take()
            .ok_or_else(|| MeshportError::Internal("callback already awaited".into()))?;

        tokio::select! {
            () = self.stop.cancelled() => Ok(CallbackResult::Cancelled),
            received = receiver => Ok(received.unwrap_or_else(|_| {
                CallbackResult::failure("authorization server went away")
            })),
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.stop.cancel();
    }
}

// ---------------------------------------------------------------------------
// Export API
// ---------------------------------------------------------------------------

/// Export API with a fixed existing-jobs list and a scripted status queue
#[derive(Default)]
pub struct MockExportApi {
    existing: Mutex<Vec<ExportJob>>,
    started: Mutex<Option<ExportJob>>,
    statuses: Mutex<VecDeque<Result<ExportJob>>>,
    requests: Mutex<Vec<ExportRequest>>,
    list_calls: AtomicUsize,
    start_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MockExportApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_existing(&self, jobs: Vec<ExportJob>) {
        *lock(&self.existing) = jobs;
    }

    pub fn set_started(&self, job: ExportJob) {
        *lock(&self.started) = Some(job);
    }

    pub fn push_statuses(&self, jobs: impl IntoIterator<Item = ExportJob>) {
        lock(&self.statuses).extend(jobs.into_iter().map(Ok));
    }

    pub fn push_status_error(&self, error: MeshportError) {
        lock(&self.statuses).push_back(Err(error));
    }

    /// Requests seen by `list_exports` and `start_export`.
    pub fn requests(&self) -> Vec<ExportRequest> {
        lock(&self.requests).clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExportApi for MockExportApi {
    async fn list_exports(&self, _token: &str, request: &ExportRequest) -> Result<Vec<ExportJob>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());
        Ok(lock(&self.existing).clone())
    }

    async fn start_export(&self, _token: &str, request: &ExportRequest) -> Result<ExportJob> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());
        lock(&self.started)
            .clone()
            .ok_or_else(|| MeshportError::Internal("no scripted export start".into()))
    }

    async fn get_export(&self, _token: &str, _export_id: &str) -> Result<ExportJob> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.statuses)
            .pop_front()
            .unwrap_or_else(|| Err(MeshportError::Internal("no scripted export status".into())))
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Catalog serving fixed projects, models and changesets
#[derive(Default)]
pub struct MockCatalogApi {
    projects: Vec<Project>,
    models: HashMap<String, Vec<Model>>,
    changesets: HashMap<String, Vec<Changeset>>,
    failure: Mutex<Option<MeshportError>>,
    tokens_seen: Mutex<Vec<String>>,
}

impl MockCatalogApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Project, models: Vec<Model>) -> Self {
        self.models.insert(project.id.clone(), models);
        self.projects.push(project);
        self
    }

    pub fn with_changesets(mut self, model_id: &str, changesets: Vec<Changeset>) -> Self {
        self.changesets.insert(model_id.to_string(), changesets);
        self
    }

    /// Fail the next call with `error`.
    pub fn fail_next(&self, error: MeshportError) {
        *lock(&self.failure) = Some(error);
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        lock(&self.tokens_seen).clone()
    }

    fn record(&self, token: &str) -> Result<()> {
        lock(&self.tokens_seen).push(token.to_string());
        match lock(&self.failure).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogApi for MockCatalogApi {
    async fn list_projects(&self, token: &str) -> Result<Vec<Project>> {
        self.record(token)?;
        Ok(self.projects.clone())
    }

    async fn list_models(&self, token: &str, project_id: &str) -> Result<Vec<Model>> {
        self.record(token)?;
        Ok(self.models.get(project_id).cloned().unwrap_or_default())
    }

    async fn list_changesets(&self, token: &str, model_id: &str) -> Result<Vec<Changeset>> {
        self.record(token)?;
        Ok(self.changesets.get(model_id).cloned().unwrap_or_default())
    }
}
