//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Compiler / dispatcher / server produce:
//!     → logging.rs (tracing events, RouteLogger capability)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log output (stdout via tracing-subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{RouteLogger, TracingLogger};
