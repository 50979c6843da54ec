//! Pure transition table for the workflow
//!
//! No I/O happens here. The session feeds in orchestrator outcomes as
//! [`WorkflowEvent`]s and stores whatever state comes back.

use meshport_domain::{
    Changeset, ExportJob, ExportSelection, Model, ModelSelection, Project, WorkflowState,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    LoginRequested,
    LoginSucceeded,
    ProjectsRequested,
    ProjectsLoaded(Vec<Project>),
    ProjectSelected(Project),
    ModelsLoaded(Vec<Model>),
    ModelSelected { model: Model, changesets: Vec<Changeset> },
    /// `None` selects the latest version.
    VersionSelected(Option<String>),
    ExportRequested,
    ExportStarted(ExportJob),
    ExportProgress(ExportJob),
    ExportCompleted(ExportJob),
    Failed(String),
    Restart,
}

impl WorkflowEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginRequested => "login_requested",
            Self::LoginSucceeded => "login_succeeded",
            Self::ProjectsRequested => "projects_requested",
            Self::ProjectsLoaded(_) => "projects_loaded",
            Self::ProjectSelected(_) => "project_selected",
            Self::ModelsLoaded(_) => "models_loaded",
            Self::ModelSelected { .. } => "model_selected",
            Self::VersionSelected(_) => "version_selected",
            Self::ExportRequested => "export_requested",
            Self::ExportStarted(_) => "export_started",
            Self::ExportProgress(_) => "export_progress",
            Self::ExportCompleted(_) => "export_completed",
            Self::Failed(_) => "failed",
            Self::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event '{event}' is not allowed in state '{from}'")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

/// Compute the next state, or reject the event for the current one.
pub fn transition(
    state: &WorkflowState,
    event: WorkflowEvent,
) -> Result<WorkflowState, TransitionError> {
    use WorkflowEvent as E;
    use WorkflowState as S;

    let rejected = TransitionError { from: state.name(), event: event.name() };

    let next = match (state, event) {
        (_, E::Restart) => S::Idle,
        (s, E::Failed(message)) if !s.is_terminal() => {
            S::Error { message, step: s.step_level() }
        }

        (S::Idle, E::LoginRequested) => S::LoggingIn,
        (S::LoggingIn, E::LoginSucceeded) => S::LoggedIn,

        (S::LoggedIn | S::SelectProject { .. }, E::ProjectsRequested) => S::FetchingProjects,
        (S::FetchingProjects, E::ProjectsLoaded(projects)) => S::SelectProject { projects },

        (S::SelectProject { .. }, E::ProjectSelected(project)) => S::FetchingModels { project },
        (S::FetchingModels { project }, E::ModelsLoaded(models)) => {
            S::SelectModel { project: project.clone(), models, selection: None }
        }

        (S::SelectModel { project, models, .. }, E::ModelSelected { model, changesets }) => {
            S::SelectModel {
                project: project.clone(),
                models: models.clone(),
                selection: Some(ModelSelection { model, changesets, changeset_id: None }),
            }
        }
        (
            S::SelectModel { project, models, selection: Some(selection) },
            E::VersionSelected(changeset_id),
        ) => S::SelectModel {
            project: project.clone(),
            models: models.clone(),
            selection: Some(ModelSelection { changeset_id, ..selection.clone() }),
        },
        (S::SelectModel { project, selection: Some(selection), .. }, E::ExportRequested) => {
            S::StartingExport {
                selection: ExportSelection {
                    project_id: project.id.clone(),
                    model_id: selection.model.id.clone(),
                    changeset_id: selection.changeset_id.clone(),
                },
            }
        }

        (S::StartingExport { selection }, E::ExportStarted(job))
        | (S::PollingExport { selection, .. }, E::ExportProgress(job)) => {
            S::PollingExport { selection: selection.clone(), job }
        }
        (
            S::StartingExport { selection } | S::PollingExport { selection, .. },
            E::ExportCompleted(job),
        ) => S::ExportComplete { selection: selection.clone(), job },

        _ => return Err(rejected),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use meshport_domain::{ExportStatus, StepLevel};

    use super::*;

    fn project() -> Project {
        Project { id: "p1".into(), display_name: "Bridge".into(), number: None }
    }

    fn model() -> Model {
        Model { id: "m1".into(), display_name: "Deck".into(), description: None }
    }

    fn job(status: ExportStatus) -> ExportJob {
        ExportJob {
            id: "job-1".into(),
            status,
            display_name: None,
            download_href: (status == ExportStatus::Complete).then(|| "https://blob/m".into()),
        }
    }

    fn run(events: Vec<WorkflowEvent>) -> WorkflowState {
        events.into_iter().fold(WorkflowState::Idle, |state, event| {
            transition(&state, event).expect("transition allowed")
        })
    }

    #[test]
    fn login_moves_idle_to_logged_in() {
        let state = transition(&WorkflowState::Idle, WorkflowEvent::LoginRequested).unwrap();
        assert_eq!(state, WorkflowState::LoggingIn);

        let state = transition(&state, WorkflowEvent::LoginSucceeded).unwrap();
        assert_eq!(state, WorkflowState::LoggedIn);
    }

    #[test]
    fn login_success_requires_logging_in() {
        let err = transition(&WorkflowState::Idle, WorkflowEvent::LoginSucceeded).unwrap_err();
        assert_eq!(err, TransitionError { from: "idle", event: "login_succeeded" });
    }

    #[test]
    fn callback_error_keeps_message() {
        let state = run(vec![
            WorkflowEvent::LoginRequested,
            WorkflowEvent::Failed("access_denied: user said no".into()),
        ]);

        assert_eq!(
            state,
            WorkflowState::Error {
                message: "access_denied: user said no".into(),
                step: StepLevel::Authentication,
            }
        );
    }

    #[test]
    fn full_happy_path() {
        let state = run(vec![
            WorkflowEvent::LoginRequested,
            WorkflowEvent::LoginSucceeded,
            WorkflowEvent::ProjectsRequested,
            WorkflowEvent::ProjectsLoaded(vec![project()]),
            WorkflowEvent::ProjectSelected(project()),
            WorkflowEvent::ModelsLoaded(vec![model()]),
            WorkflowEvent::ModelSelected { model: model(), changesets: vec![] },
            WorkflowEvent::VersionSelected(Some("cs-9".into())),
            WorkflowEvent::ExportRequested,
            WorkflowEvent::ExportStarted(job(ExportStatus::Queued)),
            WorkflowEvent::ExportProgress(job(ExportStatus::Running)),
            WorkflowEvent::ExportCompleted(job(ExportStatus::Complete)),
        ]);

        let WorkflowState::ExportComplete { selection, job } = state else {
            panic!("expected ExportComplete");
        };
        assert_eq!(selection.project_id, "p1");
        assert_eq!(selection.model_id, "m1");
        assert_eq!(selection.changeset_id.as_deref(), Some("cs-9"));
        assert_eq!(job.download_href(), Some("https://blob/m"));
    }

    #[test]
    fn export_requires_a_selected_model() {
        let state = run(vec![
            WorkflowEvent::LoginRequested,
            WorkflowEvent::LoginSucceeded,
            WorkflowEvent::ProjectsRequested,
            WorkflowEvent::ProjectsLoaded(vec![project()]),
            WorkflowEvent::ProjectSelected(project()),
            WorkflowEvent::ModelsLoaded(vec![model()]),
        ]);

        let err = transition(&state, WorkflowEvent::ExportRequested).unwrap_err();
        assert_eq!(err, TransitionError { from: "select_model", event: "export_requested" });
        assert!(transition(&state, WorkflowEvent::VersionSelected(None)).is_err());
    }

    #[test]
    fn error_is_left_only_by_restart() {
        let state = WorkflowState::Error { message: "boom".into(), step: StepLevel::Export };

        assert!(transition(&state, WorkflowEvent::LoginRequested).is_err());
        assert!(transition(&state, WorkflowEvent::Failed("again".into())).is_err());
        assert_eq!(transition(&state, WorkflowEvent::Restart).unwrap(), WorkflowState::Idle);
    }

    #[test]
    fn export_complete_is_terminal() {
        let state = WorkflowState::ExportComplete {
            selection: ExportSelection {
                project_id: "p1".into(),
                model_id: "m1".into(),
                changeset_id: None,
            },
            job: job(ExportStatus::Complete),
        };

        assert!(transition(&state, WorkflowEvent::ProjectsRequested).is_err());
        assert!(transition(&state, WorkflowEvent::Failed("late".into())).is_err());
    }

    #[test]
    fn failure_records_step_level() {
        let state = run(vec![
            WorkflowEvent::LoginRequested,
            WorkflowEvent::LoginSucceeded,
            WorkflowEvent::ProjectsRequested,
            WorkflowEvent::Failed("502".into()),
        ]);
        assert_eq!(state.step_level(), StepLevel::DataSelection);
    }
}
