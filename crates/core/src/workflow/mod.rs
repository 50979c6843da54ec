//! Login → select → export workflow

pub mod machine;
pub mod session;

pub use machine::{transition, TransitionError, WorkflowEvent};
pub use session::WorkflowSession;
