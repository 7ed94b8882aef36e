//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http::server):
//!     Load config → Compile routes → Build router → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received (signals.rs) → trigger → stop accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
