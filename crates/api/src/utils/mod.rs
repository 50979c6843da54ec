//! Command plumbing shared by the command modules

pub mod command_helpers;
pub mod logging;
