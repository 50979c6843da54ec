//! Project, model and changeset listings for data selection

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meshport_core::CatalogApi;
use meshport_domain::{CatalogConfig, Changeset, Model, Project, Result};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::client::{ApiClient, ApiClientConfig};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDto {
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectsEnvelope {
    #[serde(rename = "iTwins", default)]
    projects: Vec<ProjectDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelDto {
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsEnvelope {
    #[serde(rename = "iModels", default)]
    models: Vec<ModelDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangesetDto {
    id: String,
    index: u64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    push_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ChangesetsEnvelope {
    #[serde(default)]
    changesets: Vec<ChangesetDto>,
}

impl From<ProjectDto> for Project {
    fn from(dto: ProjectDto) -> Self {
        Self { id: dto.id, display_name: dto.display_name, number: dto.number }
    }
}

impl From<ModelDto> for Model {
    fn from(dto: ModelDto) -> Self {
        Self { id: dto.id, display_name: dto.display_name, description: dto.description }
    }
}

impl From<ChangesetDto> for Changeset {
    fn from(dto: ChangesetDto) -> Self {
        Self {
            id: dto.id,
            index: dto.index,
            description: dto.description,
            pushed_at: dto.push_date_time,
        }
    }
}

/// [`CatalogApi`] over the platform's iTwins and iModels services.
#[derive(Clone)]
pub struct CatalogClient {
    api: ApiClient,
    page_size: String,
}

impl CatalogClient {
    pub fn new(api: ApiClient, page_size: u32) -> Self {
        Self { api, page_size: page_size.max(1).to_string() }
    }

    /// # Errors
    /// Returns `MeshportError::Config` if the HTTP client cannot be built.
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let api = ApiClient::new(ApiClientConfig::new(&config.base_url, &config.accept_header))?;
        Ok(Self::new(api, config.page_size))
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    #[instrument(skip(self, token))]
    async fn list_projects(&self, token: &str) -> Result<Vec<Project>> {
        let envelope: ProjectsEnvelope =
            self.api.get(token, "/itwins/", &[("$top", self.page_size.as_str())]).await?;
        debug!(count = envelope.projects.len(), "Listed projects");
        Ok(envelope.projects.into_iter().map(Project::from).collect())
    }

    #[instrument(skip(self, token))]
    async fn list_models(&self, token: &str, project_id: &str) -> Result<Vec<Model>> {
        let envelope: ModelsEnvelope = self
            .api
            .get(token, "/imodels/", &[("iTwinId", project_id), ("$top", self.page_size.as_str())])
            .await?;
        debug!(count = envelope.models.len(), "Listed models");
        Ok(envelope.models.into_iter().map(Model::from).collect())
    }

    #[instrument(skip(self, token))]
    async fn list_changesets(&self, token: &str, model_id: &str) -> Result<Vec<Changeset>> {
        let path = format!("/imodels/{}/changesets", urlencoding::encode(model_id));
        let envelope: ChangesetsEnvelope = self
            .api
            .get(token, &path, &[("$orderBy", "index desc"), ("$top", self.page_size.as_str())])
            .await?;
        debug!(count = envelope.changesets.len(), "Listed changesets");
        Ok(envelope.changesets.into_iter().map(Changeset::from).collect())
    }
}
