//! Controllers and their handler tables.
//!
//! A controller is a shared object whose named methods serve requests. Each
//! controller type declares the handlers it exposes in a [`HandlerTable`];
//! the compiler resolves handler names against that table, so a misspelled
//! handler is caught when the route tree is compiled.
//!
//! ```text
//! ControllerFactory ──instantiate()──▶ ControllerHandle (Arc, shared by subtree)
//!                                          └── name → BoundMethod
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;

use crate::http::{ResponseControl, RouteRequest};

/// Result of a handler method, already serialized.
pub type HandlerResult = anyhow::Result<Value>;

type TableMethod<C> =
    Arc<dyn Fn(Arc<C>, RouteRequest, ResponseControl) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A handler method bound to a controller instance.
pub type BoundMethod =
    Arc<dyn Fn(RouteRequest, ResponseControl) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A request-handling object.
pub trait Controller: Send + Sync + Sized + 'static {
    /// The named handlers this controller exposes.
    fn handlers() -> HandlerTable<Self>;
}

/// Named handler methods of a controller type.
pub struct HandlerTable<C> {
    methods: Vec<(&'static str, TableMethod<C>)>,
}

impl<C: Send + Sync + 'static> HandlerTable<C> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
        }
    }

    /// Expose `method` under `name`.
    ///
    /// The method's output is serialized to JSON. `()` and `None` serialize
    /// to `null`, which the dispatcher answers with 204 No Content.
    pub fn handler<F, Fut, R>(mut self, name: &'static str, method: F) -> Self
    where
        F: Fn(Arc<C>, RouteRequest, ResponseControl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let method: TableMethod<C> = Arc::new(move |controller, req, res| {
            let pending = method(controller, req, res);
            async move {
                let output = pending.await?;
                Ok::<_, anyhow::Error>(serde_json::to_value(output)?)
            }
            .boxed()
        });
        self.methods.push((name, method));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.iter().map(|(name, _)| *name)
    }
}

impl<C: Send + Sync + 'static> Default for HandlerTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

struct ControllerInstance {
    name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
    methods: HashMap<&'static str, BoundMethod>,
}

/// A live controller instance.
///
/// Clones share the same instance.
#[derive(Clone)]
pub struct ControllerHandle {
    inner: Arc<ControllerInstance>,
}

impl ControllerHandle {
    /// Wrap `controller`, binding every method in its handler table.
    pub fn new<C: Controller>(controller: C) -> Self {
        let instance = Arc::new(controller);
        let methods = C::handlers()
            .methods
            .into_iter()
            .map(|(name, method)| {
                let target = Arc::clone(&instance);
                let bound: BoundMethod =
                    Arc::new(move |req, res| method(Arc::clone(&target), req, res));
                (name, bound)
            })
            .collect();

        Self {
            inner: Arc::new(ControllerInstance {
                name: short_type_name::<C>(),
                instance,
                methods,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Look up a handler by name.
    pub fn method(&self, name: &str) -> Option<BoundMethod> {
        self.inner.methods.get(name).cloned()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.contains_key(name)
    }

    /// The underlying controller, if it is a `C`.
    pub fn downcast<C: Controller>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.inner.instance).downcast::<C>().ok()
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.inner.methods.keys().collect();
        methods.sort();
        f.debug_struct("ControllerHandle")
            .field("name", &self.inner.name)
            .field("methods", &methods)
            .finish()
    }
}

/// Builds a fresh controller instance on each call.
#[derive(Clone)]
pub struct ControllerFactory {
    name: &'static str,
    build: Arc<dyn Fn() -> ControllerHandle + Send + Sync>,
}

impl ControllerFactory {
    /// Factory using the controller's `Default` implementation.
    pub fn of<C: Controller + Default>() -> Self {
        Self::new(C::default)
    }

    pub fn new<C, F>(build: F) -> Self
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self {
            name: short_type_name::<C>(),
            build: Arc::new(move || ControllerHandle::new(build())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instantiate(&self) -> ControllerHandle {
        (self.build)()
    }
}

impl fmt::Debug for ControllerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ControllerFactory").field(&self.name).finish()
    }
}

fn short_type_name<C>() -> &'static str {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
