//! Port interface for the remote mesh export service

use async_trait::async_trait;
use meshport_domain::{ExportJob, ExportRequest, Result};

/// Remote export API
///
/// Unknown remote status strings and undecodable bodies surface as
/// `Protocol` errors.
#[async_trait]
pub trait ExportApi: Send + Sync {
    /// Existing exports for the request's model, type and version.
    async fn list_exports(&self, token: &str, request: &ExportRequest) -> Result<Vec<ExportJob>>;

    async fn start_export(&self, token: &str, request: &ExportRequest) -> Result<ExportJob>;

    async fn get_export(&self, token: &str, export_id: &str) -> Result<ExportJob>;
}
