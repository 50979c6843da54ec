//! UI-facing commands
//!
//! Each command drives the workflow session one step and returns the
//! resulting [`WorkflowView`], which a front end renders as-is.

mod auth;
mod export;
mod selection;
mod view;

pub use auth::*;
pub use export::*;
pub use selection::*;
pub use view::*;
