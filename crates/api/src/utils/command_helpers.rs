//! Command execution helpers
//!
//! Every UI-facing command goes through [`execute_logged`] so timing and
//! failure labels are logged the same way.

use std::future::Future;
use std::time::Instant;

use meshport_domain::Result;

use crate::utils::logging::log_command_execution;

/// Execute a command and log its duration and outcome.
///
/// # Example
///
/// ```rust,ignore
/// pub async fn logout(ctx: &AppContext) -> Result<WorkflowView> {
///     execute_logged("auth::logout", || async move {
///         ctx.auth.logout().await?;
///         Ok(WorkflowView::from_session(&ctx.session))
///     })
///     .await
/// }
/// ```
pub async fn execute_logged<F, Fut, T>(command_name: &str, command_fn: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();

    let result = command_fn().await;

    let error_type = result.as_ref().err().map(|err| err.label());
    log_command_execution(command_name, start.elapsed(), error_type);

    result
}
