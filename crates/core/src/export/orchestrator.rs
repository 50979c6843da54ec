//! Find-or-start and poll loop for export jobs
//!
//! A bearer token is fetched from the [`AccessTokenProvider`] right before
//! every request, so a long poll keeps working across a token refresh.
//! Cancellation is checked before each request and while sleeping.

use std::sync::Arc;
use std::time::Duration;

use meshport_domain::{ExportConfig, ExportJob, ExportRequest, ExportStatus, MeshportError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::ports::ExportApi;
use crate::auth::AccessTokenProvider;

pub struct ExportOrchestrator {
    api: Arc<dyn ExportApi>,
    poll_interval: Duration,
    max_poll_attempts: Option<u32>,
}

impl ExportOrchestrator {
    pub fn new(api: Arc<dyn ExportApi>, config: &ExportConfig) -> Self {
        Self {
            api,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            max_poll_attempts: config.max_poll_attempts,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_poll_attempts = attempts;
        self
    }

    /// Reuse a finished export for the same request, or start a new one.
    #[instrument(skip(self, tokens, cancel), fields(resource_id = %request.resource_id))]
    pub async fn get_or_start_export(
        &self,
        tokens: &dyn AccessTokenProvider,
        request: &ExportRequest,
        cancel: &CancellationToken,
    ) -> Result<ExportJob> {
        ensure_not_cancelled(cancel)?;
        let token = tokens.access_token().await?;
        let existing = self.api.list_exports(&token, request).await?;

        if let Some(job) = existing.into_iter().find(ExportJob::is_ready) {
            info!(export_id = %job.id, "Reusing completed export");
            return Ok(job);
        }

        ensure_not_cancelled(cancel)?;
        let token = tokens.access_token().await?;
        let job = self.api.start_export(&token, request).await?;
        info!(export_id = %job.id, status = %job.status, "Started export");
        Ok(job)
    }

    /// Poll until the job reaches a terminal status.
    pub async fn poll(
        &self,
        tokens: &dyn AccessTokenProvider,
        export_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ExportJob> {
        self.poll_with(tokens, export_id, cancel, |_| {}).await
    }

    /// Same as [`ExportOrchestrator::poll`], reporting every non-terminal
    /// observation to `on_status`.
    #[instrument(skip(self, tokens, cancel, on_status))]
    pub async fn poll_with<F>(
        &self,
        tokens: &dyn AccessTokenProvider,
        export_id: &str,
        cancel: &CancellationToken,
        mut on_status: F,
    ) -> Result<ExportJob>
    where
        F: FnMut(&ExportJob) + Send,
    {
        let mut attempts: u32 = 0;
        loop {
            ensure_not_cancelled(cancel)?;
            let token = tokens.access_token().await?;
            let job = self.api.get_export(&token, export_id).await?;
            attempts += 1;
            debug!(attempt = attempts, status = %job.status, "Polled export");

            match job.status {
                ExportStatus::Complete if job.is_ready() => {
                    info!(attempts, "Export complete");
                    return Ok(job);
                }
                ExportStatus::Complete => {
                    warn!("Export reported complete without a download link");
                    return Err(MeshportError::Job(format!(
                        "export {export_id} reported {} without a download link",
                        job.status
                    )));
                }
                ExportStatus::Failed | ExportStatus::Cancelled => {
                    warn!(status = %job.status, "Export ended unsuccessfully");
                    return Err(MeshportError::Job(format!(
                        "export {export_id} ended with status {}",
                        job.status
                    )));
                }
                ExportStatus::Queued | ExportStatus::Running => on_status(&job),
            }

            if self.max_poll_attempts.is_some_and(|max| attempts >= max) {
                return Err(MeshportError::Job(format!(
                    "export {export_id} still {} after {attempts} status checks",
                    job.status
                )));
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(MeshportError::Cancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Find or start an export, then poll it to completion.
    pub async fn export<F>(
        &self,
        tokens: &dyn AccessTokenProvider,
        request: &ExportRequest,
        cancel: &CancellationToken,
        on_status: F,
    ) -> Result<ExportJob>
    where
        F: FnMut(&ExportJob) + Send,
    {
        let job = self.get_or_start_export(tokens, request, cancel).await?;
        if job.is_ready() {
            return Ok(job);
        }
        self.poll_with(tokens, &job.id, cancel, on_status).await
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(MeshportError::Cancelled);
    }
    Ok(())
}
