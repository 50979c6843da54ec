//! Mesh export job types

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifecycle of a remote export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportStatus {
    Queued,
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl_domain_status_conversions!(ExportStatus {
    Queued => "queued" | "notstarted" | "not_started" | "pending",
    Running => "running" | "inprogress" | "in_progress",
    Complete => "complete" | "completed" | "succeeded",
    Failed => "failed" | "invalid",
    Cancelled => "cancelled" | "canceled",
});

impl ExportStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

/// A server-side export job as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub status: ExportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_href: Option<String>,
}

impl ExportJob {
    /// Download handle, only when the job is complete and the href is non-empty.
    #[must_use]
    pub fn download_href(&self) -> Option<&str> {
        match (self.status, self.download_href.as_deref()) {
            (ExportStatus::Complete, Some(href)) if !href.trim().is_empty() => Some(href),
            _ => None,
        }
    }

    /// Complete with a usable download handle.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.download_href().is_some()
    }
}

/// Identifies which export to find or start
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Source model (iModel) id.
    pub resource_id: String,
    /// Version (changeset) id. `None` exports the latest version.
    pub version_id: Option<String>,
    pub export_type: String,
}

impl ExportRequest {
    pub fn new(
        resource_id: impl Into<String>,
        version_id: Option<String>,
        export_type: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            version_id: version_id.filter(|id| !id.is_empty()),
            export_type: export_type.into(),
        }
    }
}
