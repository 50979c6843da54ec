//! Serializable snapshot of the workflow for the presentation layer

use meshport_core::WorkflowSession;
use meshport_domain::WorkflowState;
use serde::Serialize;

/// What the UI needs to render the current step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    /// 1 = authentication, 2 = data selection, 3 = export.
    pub step_level: u8,
    pub busy: bool,
    pub download_href: Option<String>,
    #[serde(flatten)]
    pub state: WorkflowState,
}

impl WorkflowView {
    pub fn from_state(state: WorkflowState) -> Self {
        Self {
            step_level: state.step_level().as_number(),
            busy: state.is_busy(),
            download_href: state
                .completed_job()
                .and_then(|job| job.download_href())
                .map(String::from),
            state,
        }
    }

    pub fn from_session(session: &WorkflowSession) -> Self {
        Self::from_state(session.state())
    }
}
