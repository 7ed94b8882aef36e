//! Server plugins.
//!
//! A plugin extends the underlying axum router before the compiled routes are
//! served: extra endpoints, nested routers, middleware. Registration is a
//! passthrough; the server applies plugins in registration order.

use axum::Router;

/// An extension of the underlying router.
pub trait Plugin: Send + 'static {
    fn name(&self) -> &str;

    fn register(self: Box<Self>, router: Router) -> Router;
}

/// A router merged as-is.
impl Plugin for Router {
    fn name(&self) -> &str {
        "router"
    }

    fn register(self: Box<Self>, router: Router) -> Router {
        router.merge(*self)
    }
}

/// Plugin from a closure.
pub struct FnPlugin<F> {
    name: String,
    apply: F,
}

impl<F> Plugin for FnPlugin<F>
where
    F: FnOnce(Router) -> Router + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn register(self: Box<Self>, router: Router) -> Router {
        (self.apply)(router)
    }
}

/// Wrap `apply` as a named plugin.
pub fn plugin_fn<F>(name: impl Into<String>, apply: F) -> FnPlugin<F>
where
    F: FnOnce(Router) -> Router + Send + 'static,
{
    FnPlugin {
        name: name.into(),
        apply,
    }
}
