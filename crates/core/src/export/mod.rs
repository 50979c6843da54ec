//! Export job orchestration

pub mod orchestrator;
pub mod ports;

pub use orchestrator::ExportOrchestrator;
pub use ports::ExportApi;
