//! Port interface for the project/model catalog

use async_trait::async_trait;
use meshport_domain::{Changeset, Model, Project, Result};

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn list_projects(&self, token: &str) -> Result<Vec<Project>>;

    async fn list_models(&self, token: &str, project_id: &str) -> Result<Vec<Model>>;

    /// Newest version first.
    async fn list_changesets(&self, token: &str, model_id: &str) -> Result<Vec<Changeset>>;
}
