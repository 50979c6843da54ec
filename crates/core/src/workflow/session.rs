//! Async driver for the workflow
//!
//! The session is the only writer of [`WorkflowState`]. Each command checks
//! the current state, runs one orchestrator step, and feeds the outcome into
//! [`transition`]. Errors from orchestrators become the visible `Error` state;
//! commands issued in the wrong state are returned as `InvalidInput` and
//! leave the state alone.

use std::sync::{Arc, Mutex, PoisonError};

use meshport_domain::{ExportJob, ExportRequest, MeshportError, Result, StepLevel, WorkflowState};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::machine::{transition, TransitionError, WorkflowEvent};
use crate::auth::AuthOrchestrator;
use crate::catalog::CatalogApi;
use crate::export::ExportOrchestrator;

pub struct WorkflowSession {
    auth: Arc<AuthOrchestrator>,
    catalog: Arc<dyn CatalogApi>,
    exports: Arc<ExportOrchestrator>,
    export_type: String,
    state: watch::Sender<WorkflowState>,
    cancel: Mutex<CancellationToken>,
}

impl WorkflowSession {
    pub fn new(
        auth: Arc<AuthOrchestrator>,
        catalog: Arc<dyn CatalogApi>,
        exports: Arc<ExportOrchestrator>,
        export_type: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(WorkflowState::Idle);
        Self {
            auth,
            catalog,
            exports,
            export_type: export_type.into(),
            state,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn step_level(&self) -> StepLevel {
        self.state.borrow().step_level()
    }

    /// Receiver that wakes on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state.subscribe()
    }

    /// Download link of the finished export, if any.
    #[must_use]
    pub fn download_href(&self) -> Option<String> {
        self.state.borrow().completed_job().and_then(ExportJob::download_href).map(String::from)
    }

    pub fn auth(&self) -> &Arc<AuthOrchestrator> {
        &self.auth
    }

    /// `Idle → LoggingIn → LoggedIn`, reusing a stored session when possible.
    pub async fn login(&self) -> Result<()> {
        let cancel = self.cancel_token();
        self.command(WorkflowEvent::LoginRequested)?;

        let outcome = if self.auth.is_signed_in().await {
            debug!("Reusing existing session");
            Ok(())
        } else {
            self.auth.login(&cancel).await.map(|_| ())
        };

        self.settle(&cancel, outcome.map(|()| WorkflowEvent::LoginSucceeded))
    }

    /// Fetch the project list (`LoggedIn` or `SelectProject`).
    pub async fn fetch_projects(&self) -> Result<()> {
        let cancel = self.cancel_token();
        self.command(WorkflowEvent::ProjectsRequested)?;

        let outcome = async {
            let token = self.auth.access_token().await?;
            self.catalog.list_projects(&token).await
        }
        .await;

        self.settle(&cancel, outcome.map(WorkflowEvent::ProjectsLoaded))
    }

    /// Pick a project from `SelectProject` and load its models.
    pub async fn select_project(&self, project_id: &str) -> Result<()> {
        let project = match &*self.state.borrow() {
            WorkflowState::SelectProject { projects } => {
                projects.iter().find(|p| p.id == project_id).cloned()
            }
            other => return Err(wrong_state("select a project", other)),
        }
        .ok_or_else(|| MeshportError::InvalidInput(format!("unknown project '{project_id}'")))?;

        let cancel = self.cancel_token();
        self.command(WorkflowEvent::ProjectSelected(project.clone()))?;

        let outcome = async {
            let token = self.auth.access_token().await?;
            self.catalog.list_models(&token, &project.id).await
        }
        .await;

        self.settle(&cancel, outcome.map(WorkflowEvent::ModelsLoaded))
    }

    /// Pick a model in `SelectModel` and load its versions.
    pub async fn select_model(&self, model_id: &str) -> Result<()> {
        let model = match &*self.state.borrow() {
            WorkflowState::SelectModel { models, .. } => {
                models.iter().find(|m| m.id == model_id).cloned()
            }
            other => return Err(wrong_state("select a model", other)),
        }
        .ok_or_else(|| MeshportError::InvalidInput(format!("unknown model '{model_id}'")))?;

        let cancel = self.cancel_token();
        let outcome = async {
            let token = self.auth.access_token().await?;
            self.catalog.list_changesets(&token, &model.id).await
        }
        .await;

        self.settle(
            &cancel,
            outcome.map(|changesets| WorkflowEvent::ModelSelected { model, changesets }),
        )
    }

    /// Choose the version to export. `None` means latest.
    pub fn select_version(&self, changeset_id: Option<&str>) -> Result<()> {
        let changeset_id = changeset_id.filter(|id| !id.is_empty());
        if let Some(id) = changeset_id {
            let known = match &*self.state.borrow() {
                WorkflowState::SelectModel { selection: Some(selection), .. } => {
                    selection.changesets.iter().any(|c| c.id == id)
                }
                other => return Err(wrong_state("select a version", other)),
            };
            if !known {
                return Err(MeshportError::InvalidInput(format!("unknown version '{id}'")));
            }
        }
        self.command(WorkflowEvent::VersionSelected(changeset_id.map(String::from)))
    }

    /// Find or start the export for the current selection and poll it.
    pub async fn start_export(&self) -> Result<ExportJob> {
        let cancel = self.cancel_token();
        self.command(WorkflowEvent::ExportRequested)?;

        let request = match &*self.state.borrow() {
            WorkflowState::StartingExport { selection } => ExportRequest::new(
                selection.model_id.clone(),
                selection.changeset_id.clone(),
                self.export_type.clone(),
            ),
            other => return Err(wrong_state("start an export", other)),
        };

        let outcome = self.run_export(&request, &cancel).await;
        let job = outcome.as_ref().ok().cloned();
        self.settle(&cancel, outcome.map(WorkflowEvent::ExportCompleted))?;
        job.ok_or(MeshportError::Cancelled)
    }

    async fn run_export(
        &self,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportJob> {
        let auth = self.auth.as_ref();
        let job = self.exports.get_or_start_export(auth, request, cancel).await?;
        if job.is_ready() {
            return Ok(job);
        }

        self.advance(cancel, WorkflowEvent::ExportStarted(job.clone()));
        self.exports
            .poll_with(auth, &job.id, cancel, |update| {
                self.advance(cancel, WorkflowEvent::ExportProgress(update.clone()));
            })
            .await
    }

    /// Abort in-flight work and return to `Idle`. Also the way out of a
    /// terminal state.
    pub fn cancel(&self) {
        let previous = {
            let mut guard = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        previous.cancel();

        let from = self.state.send_replace(WorkflowState::Idle);
        info!(from = from.name(), "Workflow reset to idle");
    }

    // Taken before the first transition so a concurrent cancel always reaches it.
    fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Apply a user-initiated event; a wrong-state event is the caller's
    /// mistake and leaves the state untouched.
    fn command(&self, event: WorkflowEvent) -> Result<()> {
        self.apply(event).map_err(|e| MeshportError::InvalidInput(e.to_string()))
    }

    /// Feed an orchestrator outcome into the machine, unless the work was
    /// cancelled meanwhile. A `Cancelled` outcome nobody asked for is a
    /// failure like any other.
    fn settle(&self, cancel: &CancellationToken, outcome: Result<WorkflowEvent>) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MeshportError::Cancelled);
        }

        match outcome {
            Ok(event) => self.apply(event).map_err(|e| MeshportError::Internal(e.to_string())),
            Err(error) => {
                warn!(error = %error, kind = error.label(), "Workflow step failed");
                if let Err(e) = self.apply(WorkflowEvent::Failed(error.to_string())) {
                    debug!(error = %e, "Failure arrived in a terminal state");
                }
                Err(error)
            }
        }
    }

    /// Progress update from inside a running step.
    fn advance(&self, cancel: &CancellationToken, event: WorkflowEvent) {
        if cancel.is_cancelled() {
            return;
        }
        if let Err(e) = self.apply(event) {
            debug!(error = %e, "Ignoring stale progress update");
        }
    }

    fn apply(&self, event: WorkflowEvent) -> std::result::Result<(), TransitionError> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| match transition(state, event) {
            Ok(next) => {
                debug!(from = state.name(), to = next.name(), "Workflow transition");
                *state = next;
                true
            }
            Err(e) => {
                result = Err(e);
                false
            }
        });
        result
    }
}

fn wrong_state(action: &str, state: &WorkflowState) -> MeshportError {
    MeshportError::InvalidInput(format!("cannot {action} while {}", state.name()))
}
