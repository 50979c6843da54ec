//! Common utilities shared across Meshport crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: PKCE parameter generation and verification
//! - `platform`: platform integrations (keychain secret storage)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod auth;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

#[cfg(feature = "foundation")]
pub use auth::{verify_challenge, PkceParameters};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider};
