//! Sign-in commands

use chrono::{DateTime, Utc};
use meshport_domain::{Result, WorkflowState};
use serde::Serialize;
use tracing::info;

use super::view::WorkflowView;
use crate::context::AppContext;
use crate::utils::command_helpers::execute_logged;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub signed_in: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Sign in (reusing a stored session when possible) and load the projects.
///
/// Any workflow already under way is cancelled and restarted first.
pub async fn login(ctx: &AppContext) -> Result<WorkflowView> {
    execute_logged("auth::login", || async move {
        if ctx.session.state() != WorkflowState::Idle {
            ctx.session.cancel();
        }
        ctx.session.login().await?;
        ctx.session.fetch_projects().await?;
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}

/// Sign out locally and reset the workflow.
pub async fn logout(ctx: &AppContext) -> Result<WorkflowView> {
    execute_logged("auth::logout", || async move {
        ctx.session.cancel();
        ctx.auth.logout().await?;
        Ok(WorkflowView::from_session(&ctx.session))
    })
    .await
}

pub async fn auth_status(ctx: &AppContext) -> Result<AuthStatus> {
    execute_logged("auth::auth_status", || async move {
        let signed_in = ctx.auth.is_signed_in().await;
        let expires_at = ctx.auth.credentials().current().await.map(|tokens| tokens.expires_at);
        info!(signed_in, "auth status checked");
        Ok(AuthStatus { signed_in, expires_at })
    })
    .await
}
