//! Declarative route tree nodes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::http::{ResponseControl, RouteRequest};
use crate::routing::controller::{Controller, ControllerFactory};
use crate::routing::params::{ParamRule, ParamSchema};

/// A pre-handler check.
///
/// A guard passes by returning `Ok(())` without replying, short-circuits by
/// replying through the [`ResponseControl`], and fails by returning an error.
pub type Guard =
    Arc<dyn Fn(RouteRequest, ResponseControl) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Box an async closure as a [`Guard`].
pub fn guard<F, Fut>(check: F) -> Guard
where
    F: Fn(RouteRequest, ResponseControl) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |req, res| check(req, res).boxed())
}

/// Validation declared on a node.
#[derive(Debug, Clone, Default)]
pub struct Validate {
    /// Path parameter rules, inherited by descendants.
    pub params: Option<ParamSchema>,
    /// Other validation settings, passed through for this node only.
    pub other: Map<String, Value>,
}

/// One node of a route tree.
///
/// A node with a handler is a leaf that compiles to a dispatch entry; any
/// node may also group children under a shared path, controller and
/// parameter schema.
#[derive(Clone, Default)]
pub struct Route {
    pub(crate) path: Option<String>,
    pub(crate) method: Method,
    pub(crate) controller: Option<ControllerFactory>,
    pub(crate) handler: Option<String>,
    pub(crate) config: Map<String, Value>,
    pub(crate) validate: Validate,
    pub(crate) guards: Vec<Guard>,
    pub(crate) children: Vec<Route>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path contribution; `:name` segments become parameters.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn get(self) -> Self {
        self.method(Method::GET)
    }

    pub fn post(self) -> Self {
        self.method(Method::POST)
    }

    pub fn put(self) -> Self {
        self.method(Method::PUT)
    }

    pub fn patch(self) -> Self {
        self.method(Method::PATCH)
    }

    pub fn delete(self) -> Self {
        self.method(Method::DELETE)
    }

    /// Declare a controller built with its `Default` implementation.
    pub fn controller<C: Controller + Default>(self) -> Self {
        self.controller_factory(ControllerFactory::of::<C>())
    }

    pub fn controller_factory(mut self, factory: ControllerFactory) -> Self {
        self.controller = Some(factory);
        self
    }

    /// Name of the controller method serving this node.
    pub fn handler(mut self, name: impl Into<String>) -> Self {
        self.handler = Some(name.into());
        self
    }

    /// Set one passthrough config option.
    pub fn config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn validate_param(mut self, name: impl Into<String>, rule: ParamRule) -> Self {
        self.validate
            .params
            .get_or_insert_with(ParamSchema::new)
            .insert(name.into(), rule);
        self
    }

    pub fn validate_params(mut self, params: ParamSchema) -> Self {
        self.validate
            .params
            .get_or_insert_with(ParamSchema::new)
            .extend(params);
        self
    }

    /// Set one passthrough validation option (e.g. `payload`, `query`).
    pub fn validate_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.validate.other.insert(key.into(), value);
        self
    }

    /// Append a guard. Guards run in declaration order.
    pub fn guard<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(RouteRequest, ResponseControl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.guards.push(guard(check));
        self
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn child(mut self, child: Route) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Route>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.handler.is_some()
    }

    /// Number of leaves in this subtree, including this node.
    pub fn leaf_count(&self) -> usize {
        usize::from(self.is_leaf()) + self.children.iter().map(Route::leaf_count).sum::<usize>()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .field("controller", &self.controller)
            .field("handler", &self.handler)
            .field("config", &self.config)
            .field("validate", &self.validate)
            .field("guards", &self.guards.len())
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let route = Route::new();
        assert_eq!(route.method, Method::GET);
        assert!(route.path.is_none());
        assert!(!route.is_leaf());
    }

    #[test]
    fn test_builder() {
        let route = Route::new()
            .path(":id")
            .delete()
            .handler("remove")
            .config("description", json!("Delete a user"))
            .validate_param("id", ParamRule::Integer)
            .validate_option("query", json!({"force": "boolean"}))
            .guard(|_req, _res| async { Ok(()) });

        assert_eq!(route.method, Method::DELETE);
        assert_eq!(route.handler.as_deref(), Some("remove"));
        assert_eq!(route.config["description"], json!("Delete a user"));
        assert_eq!(
            route.validate.params.as_ref().and_then(|p| p.get("id")),
            Some(&ParamRule::Integer)
        );
        assert!(route.validate.other.contains_key("query"));
        assert_eq!(route.guards.len(), 1);
    }

    #[test]
    fn test_leaf_count() {
        let tree = Route::new()
            .handler("index")
            .child(Route::new().path("a").handler("a"))
            .child(Route::new().path("b").child(Route::new().handler("c")));
        assert_eq!(tree.leaf_count(), 3);
    }
}
