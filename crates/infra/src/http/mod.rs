//! Shared HTTP plumbing

pub mod client;

pub use client::{Delivery, HttpTransport, READ_ATTEMPTS};
