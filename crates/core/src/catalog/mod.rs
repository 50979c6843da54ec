//! Project, model and version browsing

pub mod ports;

pub use ports::CatalogApi;
