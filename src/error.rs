//! Crate-level error type for startup and serving.

use thiserror::Error;

use crate::config::ConfigError;
use crate::routing::ConfigurationError;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum Error {
    /// The route tree is misconfigured.
    #[error("route configuration error: {0}")]
    Routes(#[from] ConfigurationError),

    /// The server configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serving task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
