//! Mesh export REST client
//!
//! Wire format:
//! - `GET  /mesh-export/?iModelId=&exportType=[&changesetId=]` → `{exports:[...]}`
//! - `POST /mesh-export/` `{iModelId, changesetId, exportType}` → `{export:{...}}`
//! - `GET  /mesh-export/{id}` → `{export:{...}}`
//!
//! An export object is `{id, status, displayName, _links:{mesh:{href}}}`.

use async_trait::async_trait;
use meshport_core::ExportApi;
use meshport_domain::{ExportConfig, ExportJob, ExportRequest, ExportStatus, MeshportError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::client::{ApiClient, ApiClientConfig};

const EXPORTS_PATH: &str = "/mesh-export/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportDto {
    id: String,
    status: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(rename = "_links", default)]
    links: Option<LinksDto>,
}

#[derive(Debug, Default, Deserialize)]
struct LinksDto {
    #[serde(default)]
    mesh: Option<LinkDto>,
}

#[derive(Debug, Deserialize)]
struct LinkDto {
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExportEnvelope {
    export: ExportDto,
}

#[derive(Debug, Deserialize)]
struct ExportsEnvelope {
    #[serde(default)]
    exports: Vec<ExportDto>,
}

#[derive(Debug, Serialize)]
struct StartExportBody<'a> {
    #[serde(rename = "iModelId")]
    imodel_id: &'a str,
    #[serde(rename = "changesetId")]
    changeset_id: &'a str,
    #[serde(rename = "exportType")]
    export_type: &'a str,
}

impl TryFrom<ExportDto> for ExportJob {
    type Error = MeshportError;

    fn try_from(dto: ExportDto) -> Result<Self> {
        let status: ExportStatus = dto.status.parse().map_err(|_| {
            MeshportError::malformed(format!("unknown export status '{}' for {}", dto.status, dto.id))
        })?;
        let download_href = dto
            .links
            .and_then(|links| links.mesh)
            .and_then(|mesh| mesh.href)
            .filter(|href| !href.is_empty());

        Ok(Self { id: dto.id, status, display_name: dto.display_name, download_href })
    }
}

/// [`ExportApi`] over the platform's mesh export service.
#[derive(Clone)]
pub struct MeshExportClient {
    api: ApiClient,
}

impl MeshExportClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    /// Returns `MeshportError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let api = ApiClient::new(ApiClientConfig::new(&config.base_url, &config.accept_header))?;
        Ok(Self::new(api))
    }
}

#[async_trait]
impl ExportApi for MeshExportClient {
    #[instrument(skip(self, token, request), fields(resource_id = %request.resource_id))]
    async fn list_exports(&self, token: &str, request: &ExportRequest) -> Result<Vec<ExportJob>> {
        let mut query = vec![
            ("iModelId", request.resource_id.as_str()),
            ("exportType", request.export_type.as_str()),
        ];
        if let Some(version) = request.version_id.as_deref() {
            query.push(("changesetId", version));
        }

        let envelope: ExportsEnvelope = self.api.get(token, EXPORTS_PATH, &query).await?;
        debug!(count = envelope.exports.len(), "Listed existing exports");
        envelope.exports.into_iter().map(ExportJob::try_from).collect()
    }

    #[instrument(skip(self, token, request), fields(resource_id = %request.resource_id))]
    async fn start_export(&self, token: &str, request: &ExportRequest) -> Result<ExportJob> {
        let body = StartExportBody {
            imodel_id: &request.resource_id,
            changeset_id: request.version_id.as_deref().unwrap_or_default(),
            export_type: &request.export_type,
        };

        let envelope: ExportEnvelope = self.api.post(token, EXPORTS_PATH, &body).await?;
        ExportJob::try_from(envelope.export)
    }

    #[instrument(skip(self, token))]
    async fn get_export(&self, token: &str, export_id: &str) -> Result<ExportJob> {
        let path = format!("{EXPORTS_PATH}{}", urlencoding::encode(export_id));
        let envelope: ExportEnvelope = self.api.get(token, &path, &[]).await?;
        ExportJob::try_from(envelope.export)
    }
}
