//! HTTP server binding.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router built from compiled entries, middleware)
//!     → buffer body, validate path params against the entry schema
//!     → request.rs (RouteRequest handed to guards and handler)
//!     → entry handler (routing::pipeline)
//!     → response.rs (Reply recorded on ResponseControl → axum Response)
//!     → Send to client
//! ```

pub mod plugin;
pub mod request;
pub mod response;
pub mod server;

pub use plugin::{plugin_fn, Plugin};
pub use request::{RouteRequest, X_REQUEST_ID};
pub use response::{DispatchState, Reply, ResponseControl};
pub use server::{RuttServer, ServerHandle};
