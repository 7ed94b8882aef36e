//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Provide the [`RouteLogger`] capability used by the compiler and dispatcher
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level from `RUST_LOG`, falling back to the configured level
//! - Route events go through an injected logger so callers choose the sink

use axum::http::Method;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Returns an error if a global subscriber is already installed.
pub fn init(default_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rutt={},tower_http={}", default_level, default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Sink for route-level events.
pub trait RouteLogger: Send + Sync {
    /// One line per compiled route, emitted at registration.
    fn route_registered(&self, method: &Method, path: &str);

    /// A guard or handler failed with an error that has no HTTP shape.
    fn unhandled_error(&self, method: &Method, path: &str, error: &anyhow::Error);
}

/// [`RouteLogger`] backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RouteLogger for TracingLogger {
    fn route_registered(&self, method: &Method, path: &str) {
        tracing::info!("[{}] {}", method, path);
    }

    fn unhandled_error(&self, method: &Method, path: &str, error: &anyhow::Error) {
        tracing::error!(
            method = %method,
            route = %path,
            error = ?error,
            "Unhandled error in route handler"
        );
    }
}
