//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the configured level when present. Output goes to
//! stderr so command output on stdout stays machine-readable.

use std::io;

use meshport_domain::{LoggingConfig, MeshportError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install the global subscriber described by `config`.
///
/// Idempotent: when a global subscriber is already installed it is kept and
/// this returns `Ok`.
///
/// # Errors
/// Returns `MeshportError::Config` if the level directive is invalid.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let output = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .boxed()
    };

    if let Err(e) = tracing_subscriber::registry().with(output.with_filter(filter)).try_init() {
        tracing::debug!(error = %e, "tracing subscriber already installed, keeping it");
        return Ok(());
    }

    tracing::debug!(level = %config.level, json = config.json, "tracing initialized");
    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| MeshportError::Config(format!("invalid log level '{}': {e}", config.level))),
    }
}
