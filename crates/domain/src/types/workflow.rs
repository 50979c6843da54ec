//! Workflow state exposed to the presentation layer

use serde::{Deserialize, Serialize};

use super::catalog::{Changeset, Model, Project};
use super::export::ExportJob;

/// Coarse progress indicator rendered by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StepLevel {
    Authentication = 1,
    DataSelection = 2,
    Export = 3,
}

impl StepLevel {
    #[must_use]
    pub fn as_number(self) -> u8 {
        self as u8
    }
}

/// Model picked in `SelectModel`, with the versions loaded for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub model: Model,
    pub changesets: Vec<Changeset>,
    /// `None` exports the latest version.
    pub changeset_id: Option<String>,
}

/// Everything needed to start an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSelection {
    pub project_id: String,
    pub model_id: String,
    pub changeset_id: Option<String>,
}

/// Where the user is in the login → select → export workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    LoggingIn,
    LoggedIn,
    FetchingProjects,
    SelectProject {
        projects: Vec<Project>,
    },
    FetchingModels {
        project: Project,
    },
    SelectModel {
        project: Project,
        models: Vec<Model>,
        selection: Option<ModelSelection>,
    },
    StartingExport {
        selection: ExportSelection,
    },
    PollingExport {
        selection: ExportSelection,
        job: ExportJob,
    },
    ExportComplete {
        selection: ExportSelection,
        job: ExportJob,
    },
    Error {
        message: String,
        /// Step the workflow was in when it failed.
        step: StepLevel,
    },
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::Idle
    }
}

impl WorkflowState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoggingIn => "logging_in",
            Self::LoggedIn => "logged_in",
            Self::FetchingProjects => "fetching_projects",
            Self::SelectProject { .. } => "select_project",
            Self::FetchingModels { .. } => "fetching_models",
            Self::SelectModel { .. } => "select_model",
            Self::StartingExport { .. } => "starting_export",
            Self::PollingExport { .. } => "polling_export",
            Self::ExportComplete { .. } => "export_complete",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn step_level(&self) -> StepLevel {
        match self {
            Self::Idle | Self::LoggingIn | Self::LoggedIn => StepLevel::Authentication,
            Self::FetchingProjects
            | Self::SelectProject { .. }
            | Self::FetchingModels { .. }
            | Self::SelectModel { .. } => StepLevel::DataSelection,
            Self::StartingExport { .. } | Self::PollingExport { .. } | Self::ExportComplete { .. } => {
                StepLevel::Export
            }
            Self::Error { step, .. } => *step,
        }
    }

    /// Terminal for the current session; only a restart leaves it.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ExportComplete { .. } | Self::Error { .. })
    }

    /// A network step is in flight; the UI should gate input.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::LoggingIn
                | Self::FetchingProjects
                | Self::FetchingModels { .. }
                | Self::StartingExport { .. }
                | Self::PollingExport { .. }
        )
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Final job once the export completed.
    #[must_use]
    pub fn completed_job(&self) -> Option<&ExportJob> {
        match self {
            Self::ExportComplete { job, .. } => Some(job),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> ExportSelection {
        ExportSelection { project_id: "p".into(), model_id: "m".into(), changeset_id: None }
    }

    #[test]
    fn step_levels_follow_workflow_phases() {
        assert_eq!(WorkflowState::Idle.step_level(), StepLevel::Authentication);
        assert_eq!(WorkflowState::LoggedIn.step_level().as_number(), 1);
        assert_eq!(WorkflowState::FetchingProjects.step_level().as_number(), 2);
        assert_eq!(
            WorkflowState::StartingExport { selection: selection() }.step_level().as_number(),
            3
        );
    }

    #[test]
    fn error_reports_the_step_it_failed_in() {
        let state = WorkflowState::Error { message: "boom".into(), step: StepLevel::Export };
        assert_eq!(state.step_level(), StepLevel::Export);
        assert_eq!(state.error_message(), Some("boom"));
        assert!(state.is_terminal());
        assert!(!state.is_busy());
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(WorkflowState::LoggingIn).unwrap();
        assert_eq!(json["state"], "logging_in");
    }
}
