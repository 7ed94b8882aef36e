//! Declarative, tree-structured HTTP routing on top of Axum.
//!
//! Routes are declared as a tree: path prefixes, controllers and parameter
//! rules declared on a node apply to its whole subtree. The tree is compiled
//! once at startup into a flat table of dispatch entries, each wrapping its
//! leaf's guards, controller method and error translation into one handler.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use http::{Reply, ResponseControl, RouteRequest, RuttServer, ServerHandle};
pub use lifecycle::Shutdown;
pub use routing::{
    compile, Controller, ControllerFactory, ConfigurationError, DispatchEntry, HandlerTable,
    HttpError, ParamRule, Route,
};
