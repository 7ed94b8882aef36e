//! Route tree compilation.
//!
//! # Responsibilities
//! - Walk the route tree depth-first, pre-order
//! - Fork the context per child and apply each node's contributions
//! - Resolve leaf handlers against their controller
//! - Emit one [`DispatchEntry`] per leaf
//!
//! # Design Decisions
//! - Compiled once at startup, immutable afterwards
//! - Any configuration error aborts the whole compilation
//! - Guards belong to the declaring leaf only; ancestors' guards do not apply

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::http::{ResponseControl, RouteRequest};
use crate::observability::logging::{RouteLogger, TracingLogger};
use crate::routing::context::RouteContext;
use crate::routing::controller::ControllerHandle;
use crate::routing::error::ConfigurationError;
use crate::routing::params::ParamSchema;
use crate::routing::pipeline::Pipeline;
use crate::routing::route::Route;

/// Compiled request handler for one entry.
pub type RouteHandler =
    Arc<dyn Fn(RouteRequest, ResponseControl) -> BoxFuture<'static, ()> + Send + Sync>;

/// Validation settings of a compiled entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidateConfig {
    /// Every parameter rule inherited along the path to the leaf.
    pub params: ParamSchema,
    pub other: Map<String, Value>,
}

/// Configuration of a compiled entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteConfig {
    pub validate: ValidateConfig,
    /// Passthrough options declared on the leaf.
    pub options: Map<String, Value>,
}

/// One flattened, ready-to-register route.
#[derive(Clone)]
pub struct DispatchEntry {
    pub method: Method,
    /// Path in `{name}` parameter syntax.
    pub path: String,
    pub config: RouteConfig,
    pub controller: ControllerHandle,
    pub handler_name: String,
    /// Number of guards the handler runs before dispatch.
    pub guard_count: usize,
    pub handler: RouteHandler,
}

impl DispatchEntry {
    /// Serve a request through this entry's pipeline.
    pub async fn handle(&self, req: RouteRequest, control: ResponseControl) {
        (self.handler)(req, control).await
    }
}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("config", &self.config)
            .field("controller", &self.controller.name())
            .field("handler_name", &self.handler_name)
            .field("guard_count", &self.guard_count)
            .finish()
    }
}

/// Flattens route trees into dispatch entries.
#[derive(Clone)]
pub struct Compiler {
    logger: Arc<dyn RouteLogger>,
}

impl Compiler {
    pub fn new(logger: Arc<dyn RouteLogger>) -> Self {
        Self { logger }
    }

    /// Compile `routes` from an empty root context.
    pub fn compile_tree(&self, routes: &[Route]) -> Result<Vec<DispatchEntry>, ConfigurationError> {
        self.compile(routes, &RouteContext::root())
    }

    /// Compile `routes` under `context`.
    pub fn compile(
        &self,
        routes: &[Route],
        context: &RouteContext,
    ) -> Result<Vec<DispatchEntry>, ConfigurationError> {
        let mut entries = Vec::new();
        self.compile_into(routes, context, &mut entries)?;
        Ok(entries)
    }

    fn compile_into(
        &self,
        routes: &[Route],
        parent: &RouteContext,
        entries: &mut Vec<DispatchEntry>,
    ) -> Result<(), ConfigurationError> {
        for route in routes {
            let mut ctx = parent.fork();

            if let Some(path) = &route.path {
                ctx.push_path(path);
            }

            if let Some(factory) = &route.controller {
                ctx.replace_controller(factory.instantiate());
            }

            if let Some(params) = &route.validate.params {
                ctx.extend_params(params);
            }

            if let Some(handler) = &route.handler {
                entries.push(self.compile_leaf(route, handler, &ctx)?);
            }

            self.compile_into(&route.children, &ctx, entries)?;
        }
        Ok(())
    }

    fn compile_leaf(
        &self,
        route: &Route,
        handler: &str,
        ctx: &RouteContext,
    ) -> Result<DispatchEntry, ConfigurationError> {
        let controller = ctx
            .controller()
            .ok_or_else(|| ConfigurationError::MissingController {
                handler: handler.to_string(),
                path: ctx.path().to_string(),
            })?;

        let target = controller
            .method(handler)
            .ok_or_else(|| ConfigurationError::UnknownHandler {
                handler: handler.to_string(),
                controller: controller.name().to_string(),
            })?;

        let config = RouteConfig {
            validate: ValidateConfig {
                params: ctx.params().clone(),
                other: route.validate.other.clone(),
            },
            options: route.config.clone(),
        };

        let pipeline = Arc::new(Pipeline {
            method: route.method.clone(),
            path: ctx.path().to_string(),
            guards: route.guards.clone(),
            target,
            logger: Arc::clone(&self.logger),
        });
        let handler_fn: RouteHandler = Arc::new(move |req, control| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.run(req, control).await }.boxed()
        });

        Ok(DispatchEntry {
            method: route.method.clone(),
            path: ctx.path().to_string(),
            config,
            controller: controller.clone(),
            handler_name: handler.to_string(),
            guard_count: route.guards.len(),
            handler: handler_fn,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger))
    }
}

/// Compile `routes` with the default tracing logger.
pub fn compile(routes: &[Route]) -> Result<Vec<DispatchEntry>, ConfigurationError> {
    Compiler::default().compile_tree(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Reply;
    use crate::observability::logging::testing::RecordingLogger;
    use crate::routing::controller::{Controller, HandlerTable};
    use crate::routing::params::ParamRule;
    use axum::http::{StatusCode, Uri};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct UsersController {
        calls: AtomicUsize,
    }

    impl Controller for UsersController {
        fn handlers() -> HandlerTable<Self> {
            HandlerTable::new()
                .handler("get", |this: Arc<Self>, req: RouteRequest, _res| async move {
                    this.calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "id": req.param("id") }))
                })
                .handler("list", |this: Arc<Self>, _req, _res| async move {
                    this.calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec!["ada", "grace"])
                })
        }
    }

    #[derive(Default)]
    struct PostsController;

    impl Controller for PostsController {
        fn handlers() -> HandlerTable<Self> {
            HandlerTable::new().handler("list", |_this: Arc<Self>, _req, _res| async { Ok(()) })
        }
    }

    fn users_tree() -> Vec<Route> {
        vec![Route::new().controller::<UsersController>().child(
            Route::new()
                .path("users")
                .child(Route::new().path(":id").get().handler("get")),
        )]
    }

    #[test]
    fn test_compiles_nested_path() {
        let entries = compile(&users_tree()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].method, Method::GET);
        assert_eq!(entries[0].path, "/users/{id}");
        assert_eq!(entries[0].controller.name(), "UsersController");
        assert_eq!(entries[0].handler_name, "get");
    }

    #[tokio::test]
    async fn test_end_to_end_dispatch() {
        let entries = compile(&users_tree()).unwrap();
        let req = RouteRequest::new(Method::GET, Uri::from_static("/users/42")).with_param("id", "42");
        let control = ResponseControl::new();
        entries[0].handle(req, control.clone()).await;

        let reply = control.reply().unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.body(), Some(&json!({"id": "42"})));
    }

    #[test]
    fn test_entry_count_matches_leaves() {
        let tree = vec![
            Route::new()
                .controller::<UsersController>()
                .path("users")
                .handler("list")
                .children([
                    Route::new().path(":id").handler("get"),
                    Route::new().path("nested").child(Route::new().path(":id").handler("get")),
                ]),
            Route::new()
                .controller::<PostsController>()
                .path("posts")
                .handler("list"),
        ];
        let entries = compile(&tree).unwrap();
        let leaves: usize = tree.iter().map(Route::leaf_count).sum();
        assert_eq!(entries.len(), leaves);

        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/users", "/users/{id}", "/users/nested/{id}", "/posts"]);
    }

    #[test]
    fn test_sibling_param_isolation() {
        let tree = vec![Route::new()
            .controller::<UsersController>()
            .path("tenants/:tenant")
            .validate_param("tenant", ParamRule::Alphanumeric)
            .children([
                Route::new()
                    .path("users/:id")
                    .validate_param("id", ParamRule::Integer)
                    .handler("get"),
                Route::new()
                    .path("keys/:key")
                    .validate_param("key", ParamRule::Uuid)
                    .handler("get"),
            ])];
        let entries = compile(&tree).unwrap();

        let first = &entries[0].config.validate.params;
        let second = &entries[1].config.validate.params;
        assert_eq!(first.get("tenant"), Some(&ParamRule::Alphanumeric));
        assert_eq!(second.get("tenant"), Some(&ParamRule::Alphanumeric));
        assert_eq!(first.get("id"), Some(&ParamRule::Integer));
        assert!(first.get("key").is_none());
        assert_eq!(second.get("key"), Some(&ParamRule::Uuid));
        assert!(second.get("id").is_none());
    }

    #[test]
    fn test_controller_identity() {
        let tree = vec![
            Route::new().controller::<UsersController>().children([
                Route::new().path("a").handler("list"),
                Route::new().path("b").child(Route::new().handler("list")),
            ]),
            Route::new()
                .controller::<UsersController>()
                .path("c")
                .handler("list"),
        ];
        let entries = compile(&tree).unwrap();
        assert!(ControllerHandle::ptr_eq(&entries[0].controller, &entries[1].controller));
        assert!(!ControllerHandle::ptr_eq(&entries[0].controller, &entries[2].controller));
    }

    #[test]
    fn test_nested_controller_overrides() {
        let tree = vec![Route::new().controller::<UsersController>().children([
            Route::new().path("users").handler("list"),
            Route::new()
                .controller::<PostsController>()
                .path("posts")
                .handler("list"),
            Route::new().path("again").handler("list"),
        ])];
        let entries = compile(&tree).unwrap();
        assert_eq!(entries[1].controller.name(), "PostsController");
        assert_eq!(entries[2].controller.name(), "UsersController");
        assert!(ControllerHandle::ptr_eq(&entries[0].controller, &entries[2].controller));
    }

    #[tokio::test]
    async fn test_shared_controller_state() {
        let tree = vec![Route::new().controller::<UsersController>().children([
            Route::new().path("a").handler("list"),
            Route::new().path("b").handler("list"),
        ])];
        let entries = compile(&tree).unwrap();
        for entry in &entries {
            entry
                .handle(
                    RouteRequest::new(Method::GET, Uri::from_static("/")),
                    ResponseControl::new(),
                )
                .await;
        }
        let users = entries[0].controller.downcast::<UsersController>().unwrap();
        assert_eq!(users.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_controller() {
        let tree = vec![Route::new().path("orphans").child(Route::new().path(":id").handler("get"))];
        let err = compile(&tree).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MissingController {
                handler: "get".into(),
                path: "/orphans/{id}".into(),
            }
        );
    }

    #[test]
    fn test_unknown_handler() {
        let tree = vec![Route::new()
            .controller::<UsersController>()
            .path("users")
            .handler("get")
            .child(Route::new().path(":id").handler("destroy"))];
        let err = compile(&tree).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownHandler {
                handler: "destroy".into(),
                controller: "UsersController".into(),
            }
        );
    }

    #[test]
    fn test_guards_are_leaf_scoped() {
        let tree = vec![Route::new()
            .controller::<UsersController>()
            .guard(|_req, _res| async { Ok(()) })
            .guard(|_req, _res| async { Ok(()) })
            .handler("list")
            .children([
                Route::new().path("plain").handler("list"),
                Route::new()
                    .path("guarded")
                    .guard(|_req, _res| async { Ok(()) })
                    .handler("list"),
            ])];
        let entries = compile(&tree).unwrap();
        let counts: Vec<_> = entries.iter().map(|e| e.guard_count).collect();
        assert_eq!(counts, vec![2, 0, 1]);
    }

    #[tokio::test]
    async fn test_ancestor_guard_does_not_run() {
        let tree = vec![Route::new()
            .controller::<UsersController>()
            .path("admin")
            .guard(|_req, res: ResponseControl| async move {
                res.send(Reply::empty(StatusCode::FORBIDDEN));
                Ok(())
            })
            .child(Route::new().path("open").handler("list"))];
        let entries = compile(&tree).unwrap();
        assert_eq!(entries.len(), 1);

        let control = ResponseControl::new();
        entries[0]
            .handle(RouteRequest::new(Method::GET, Uri::from_static("/admin/open")), control.clone())
            .await;
        assert_eq!(control.reply().unwrap().status(), StatusCode::OK);
    }

    #[test]
    fn test_config_passthrough() {
        let tree = vec![Route::new()
            .controller::<UsersController>()
            .config("tags", json!(["api"]))
            .validate_option("payload", json!({"name": "string"}))
            .children([Route::new()
                .path("users")
                .config("description", json!("List users"))
                .handler("list")])];
        let entries = compile(&tree).unwrap();
        let config = &entries[0].config;
        assert_eq!(config.options.get("description"), Some(&json!("List users")));
        assert!(config.options.get("tags").is_none());
        assert!(config.validate.other.is_empty());
    }

    #[tokio::test]
    async fn test_injected_logger_receives_errors() {
        #[derive(Default)]
        struct Broken;

        impl Controller for Broken {
            fn handlers() -> HandlerTable<Self> {
                HandlerTable::new().handler("fail", |_this: Arc<Self>, _req, _res| async {
                    Err::<(), _>(anyhow::anyhow!("boom"))
                })
            }
        }

        let logger = Arc::new(RecordingLogger::default());
        let compiler = Compiler::new(logger.clone());
        let entries = compiler
            .compile_tree(&[Route::new().controller::<Broken>().path("x").handler("fail")])
            .unwrap();
        let control = ResponseControl::new();
        entries[0]
            .handle(RouteRequest::new(Method::GET, Uri::from_static("/x")), control.clone())
            .await;

        assert_eq!(control.reply().unwrap().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(*logger.errors.lock().unwrap(), vec!["/x: boom".to_string()]);
    }

    #[test]
    fn test_compile_under_prefix() {
        let ctx = RouteContext::with_prefix("api/v1");
        let entries = Compiler::default().compile(&users_tree(), &ctx).unwrap();
        assert_eq!(entries[0].path, "/api/v1/users/{id}");
    }

    #[test]
    fn test_compile_under_resolved_controller() {
        let users = ControllerHandle::new(UsersController::default());
        let ctx = RouteContext::with_prefix("api").with_controller(users.clone());
        let tree = vec![
            Route::new().path("users/:id").handler("get"),
            Route::new().controller::<PostsController>().path("posts").handler("list"),
        ];

        let entries = Compiler::default().compile(&tree, &ctx).unwrap();
        assert_eq!(entries[0].path, "/api/users/{id}");
        assert!(ControllerHandle::ptr_eq(&entries[0].controller, &users));
        assert_eq!(entries[1].controller.name(), "PostsController");
        assert!(!ControllerHandle::ptr_eq(&entries[1].controller, &users));
    }
}
