//! OAuth helpers shared by the login flow

pub mod pkce;

pub use pkce::{verify_challenge, PkceParameters};
