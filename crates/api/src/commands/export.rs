//! Export commands

use meshport_domain::Result;

use super::view::WorkflowView;
use crate::context::AppContext;
use crate::utils::command_helpers::execute_logged;

/// Find or start the export for the current selection and wait for it.
pub async fn start_export(ctx: &AppContext) -> Result<WorkflowView> {
    execute_logged("export::start_export", || async move {
        ctx.session.start_export().await?;
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}

/// Abort whatever is running and return to the start.
pub async fn cancel(ctx: &AppContext) -> Result<WorkflowView> {
    execute_logged("export::cancel", || async move {
        ctx.session.cancel();
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}

pub fn workflow_state(ctx: &AppContext) -> WorkflowView {
    WorkflowView::from_session(&ctx.session)
}
