//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     Route tree (route.rs)
//!     → compiler.rs (depth-first walk, context.rs forks per child)
//!     → controller.rs (instantiate controllers, resolve handler names)
//!     → Vec<DispatchEntry>, frozen
//!
//! Request Dispatch (per request):
//!     DispatchEntry handler
//!     → pipeline.rs (guards → handler → error translation)
//!     → exactly one Reply on the ResponseControl
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Matching is left to the HTTP server; entries only carry method and path
//! - Configuration errors are fatal and detected before the server starts

pub mod compiler;
pub mod context;
pub mod controller;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod route;

pub use compiler::{compile, Compiler, DispatchEntry, RouteConfig, RouteHandler, ValidateConfig};
pub use context::RouteContext;
pub use controller::{Controller, ControllerFactory, ControllerHandle, HandlerTable};
pub use error::{ConfigurationError, HttpError};
pub use params::{ParamRule, ParamSchema};
pub use route::{guard, Guard, Route, Validate};
