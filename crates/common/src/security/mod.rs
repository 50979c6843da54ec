//! Security primitives

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider};
