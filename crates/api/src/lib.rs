//! # Meshport API
//!
//! Application layer - commands, composition root and the CLI entry point.
//!
//! This crate contains:
//! - UI-facing commands that drive the workflow one step at a time
//! - Application context (dependency injection)
//! - Command logging helpers
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - The `meshport` binary runs the workflow headless from a terminal

pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
