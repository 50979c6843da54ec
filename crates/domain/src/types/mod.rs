//! Domain types and models

pub mod auth;
pub mod catalog;
pub mod export;
pub mod workflow;

pub use auth::{CallbackResult, TokenSet};
pub use catalog::{Changeset, Model, Project};
pub use export::{ExportJob, ExportRequest, ExportStatus};
pub use workflow::{ExportSelection, ModelSelection, StepLevel, WorkflowState};
