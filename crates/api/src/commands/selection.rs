//! Project, model and version selection commands

use meshport_domain::Result;

use super::view::WorkflowView;
use crate::context::AppContext;
use crate::utils::command_helpers::execute_logged;

/// Reload the project list.
pub async fn refresh_projects(ctx: &AppContext) -> Result<WorkflowView> {
    execute_logged("selection::refresh_projects", || async move {
        ctx.session.fetch_projects().await?;
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}

pub async fn select_project(ctx: &AppContext, project_id: &str) -> Result<WorkflowView> {
    execute_logged("selection::select_project", || async move {
        ctx.session.select_project(project_id).await?;
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}

/// Pick a model and load its versions, newest first.
pub async fn select_model(ctx: &AppContext, model_id: &str) -> Result<WorkflowView> {
    execute_logged("selection::select_model", || async move {
        ctx.session.select_model(model_id).await?;
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}

/// Choose the version to export; `None` or an empty id means latest.
pub async fn select_version(ctx: &AppContext, changeset_id: Option<&str>) -> Result<WorkflowView> {
    execute_logged("selection::select_version", || async move {
        ctx.session.select_version(changeset_id)?;
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}
