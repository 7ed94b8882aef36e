//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile route trees into dispatch entries (fail fast on misconfiguration)
//! - Register each entry with an Axum router, logging one line per route
//! - Apply plugins and middleware (tracing, timeout, request ID)
//! - Buffer bodies and validate path parameters before dispatch
//! - Bind the listener and serve until shutdown

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Path, Request},
    http::request::Parts,
    response::{IntoResponse, Response},
    routing::{on, MethodFilter},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::http::plugin::Plugin;
use crate::http::request::RouteRequest;
use crate::http::response::ResponseControl;
use crate::lifecycle::Shutdown;
use crate::observability::logging::{RouteLogger, TracingLogger};
use crate::observability::metrics;
use crate::routing::params::validate_params;
use crate::routing::{Compiler, ConfigurationError, DispatchEntry, HttpError, Route};

/// HTTP server serving a compiled route tree.
pub struct RuttServer {
    config: ServerConfig,
    compiler: Compiler,
    logger: Arc<dyn RouteLogger>,
    entries: Vec<DispatchEntry>,
    plugins: Vec<Box<dyn Plugin>>,
}

impl RuttServer {
    /// Create a server that logs through `tracing`.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_logger(config, Arc::new(TracingLogger))
    }

    pub fn with_logger(config: ServerConfig, logger: Arc<dyn RouteLogger>) -> Self {
        Self {
            config,
            compiler: Compiler::new(Arc::clone(&logger)),
            logger,
            entries: Vec::new(),
            plugins: Vec::new(),
        }
    }

    /// Compile `routes`, replacing any previously compiled table.
    ///
    /// On error nothing is replaced.
    pub fn routes(&mut self, routes: &[Route]) -> std::result::Result<&mut Self, ConfigurationError> {
        let entries = self.compiler.compile_tree(routes)?;
        check_entries(&entries)?;
        self.entries = entries;
        Ok(self)
    }

    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Register a plugin.
    pub fn register<P: Plugin>(&mut self, plugin: P) -> &mut Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Register several plugins, in order.
    pub fn register_all<I>(&mut self, plugins: I) -> &mut Self
    where
        I: IntoIterator<Item = Box<dyn Plugin>>,
    {
        self.plugins.extend(plugins);
        self
    }

    /// Build the Axum router: compiled routes, plugins, middleware.
    #[allow(deprecated)]
    pub fn into_router(self) -> std::result::Result<Router, ConfigurationError> {
        let max_body_bytes = self.config.limits.max_body_bytes;
        let mut router = Router::new();

        for entry in self.entries {
            let filter = method_filter(&entry)?;
            self.logger.route_registered(&entry.method, &entry.path);

            let path = entry.path.clone();
            let entry = Arc::new(entry);
            let endpoint = move |Path(params): Path<HashMap<String, String>>, request: Request| {
                let entry = Arc::clone(&entry);
                async move { serve_entry(&entry, params, request, max_body_bytes).await }
            };
            router = router.route(&path, on(filter, endpoint));
        }

        for plugin in self.plugins {
            tracing::debug!(plugin = plugin.name(), "Registering plugin");
            router = plugin.register(router);
        }

        Ok(router
            .fallback(|| async { HttpError::not_found("Not Found").to_reply() })
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        self.config.timeouts.request_secs,
                    )))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            ))
    }

    /// Register routes, bind the configured address and start serving.
    pub async fn start(self) -> Result<ServerHandle> {
        let bind_address = self.config.listener.bind_address.clone();
        let route_count = self.entries.len();
        let router = self.into_router()?;
        let listener = TcpListener::bind(&bind_address).await?;
        serve(listener, router, route_count)
    }

    /// Register routes and start serving on an already bound listener.
    pub async fn start_on(self, listener: TcpListener) -> Result<ServerHandle> {
        let route_count = self.entries.len();
        let router = self.into_router()?;
        serve(listener, router, route_count)
    }
}

fn serve(listener: TcpListener, router: Router, route_count: usize) -> Result<ServerHandle> {
    let local_addr = listener.local_addr()?;
    let shutdown = Shutdown::new();
    let signal = shutdown.wait();

    metrics::record_routes_registered(route_count);
    let task = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(signal)
            .await
    });

    tracing::info!(address = %local_addr, routes = route_count, "HTTP server listening");
    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
    })
}

/// A running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Coordinator that stops this server when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop accepting connections and drain in-flight requests.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the server to stop.
    pub async fn wait(self) -> Result<()> {
        self.task.await??;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Trigger shutdown and wait for it to complete.
    pub async fn stop(self) -> Result<()> {
        self.shutdown();
        self.wait().await
    }
}

fn method_filter(entry: &DispatchEntry) -> std::result::Result<MethodFilter, ConfigurationError> {
    MethodFilter::try_from(entry.method.clone()).map_err(|_| ConfigurationError::UnsupportedMethod {
        method: entry.method.clone(),
        path: entry.path.clone(),
    })
}

/// Reject tables the router cannot serve.
fn check_entries(entries: &[DispatchEntry]) -> std::result::Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    // Parameter name at each `{}`-erased prefix, with the path that declared it.
    let mut param_names: HashMap<String, (&str, &str)> = HashMap::new();

    for entry in entries {
        method_filter(entry)?;
        if !seen.insert((entry.method.clone(), entry.path.as_str())) {
            return Err(ConfigurationError::DuplicateRoute {
                method: entry.method.clone(),
                path: entry.path.clone(),
            });
        }

        let mut shape = String::new();
        for segment in entry.path.split('/').filter(|s| !s.is_empty()) {
            shape.push('/');
            let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                shape.push_str(segment);
                continue;
            };
            if name.is_empty() {
                return Err(ConfigurationError::EmptyParamName {
                    path: entry.path.clone(),
                });
            }
            shape.push_str("{}");
            let (existing, existing_path) = *param_names
                .entry(shape.clone())
                .or_insert((name, entry.path.as_str()));
            if existing != name {
                return Err(ConfigurationError::ConflictingParamName {
                    path: entry.path.clone(),
                    name: name.to_string(),
                    existing_path: existing_path.to_string(),
                    existing: existing.to_string(),
                });
            }
        }
    }
    Ok(())
}

async fn serve_entry(
    entry: &DispatchEntry,
    params: HashMap<String, String>,
    request: Request,
    max_body_bytes: usize,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let reply = match prepare(entry, parts, params, body, max_body_bytes).await {
        Ok(request) => {
            let control = ResponseControl::new();
            entry.handle(request, control.clone()).await;
            control
                .take_reply()
                .unwrap_or_else(|| HttpError::internal("Handler completed without a reply").to_reply())
        }
        Err(err) => {
            tracing::debug!(route = %entry.path, error = %err, "Request rejected before dispatch");
            err.to_reply()
        }
    };

    metrics::record_request(entry.method.as_str(), &entry.path, reply.status().as_u16(), start);
    reply.into_response()
}

/// Validate path parameters and buffer the body.
async fn prepare(
    entry: &DispatchEntry,
    parts: Parts,
    params: HashMap<String, String>,
    body: Body,
    max_body_bytes: usize,
) -> std::result::Result<RouteRequest, HttpError> {
    validate_params(&entry.config.validate.params, &params)?;
    let body = axum::body::to_bytes(body, max_body_bytes).await.map_err(|_| {
        HttpError::payload_too_large(format!(
            "Request body could not be read within {} bytes",
            max_body_bytes
        ))
    })?;
    Ok(RouteRequest::from_parts(parts, params, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Controller, HandlerTable};
    use axum::http::Method;

    #[derive(Default)]
    struct Ping;

    impl Controller for Ping {
        fn handlers() -> HandlerTable<Self> {
            HandlerTable::new().handler("ping", |_this: Arc<Self>, _req, _res| async { Ok("pong") })
        }
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut server = RuttServer::new(ServerConfig::default());
        let err = server
            .routes(&[Route::new().controller::<Ping>().children([
                Route::new().path("ping").handler("ping"),
                Route::new().path("/ping/").handler("ping"),
            ])])
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigurationError::DuplicateRoute {
                method: Method::GET,
                path: "/ping".into()
            }
        );
        assert!(server.entries().is_empty());
    }

    #[test]
    fn test_conflicting_param_names_rejected() {
        let mut server = RuttServer::new(ServerConfig::default());
        let err = server
            .routes(&[Route::new().controller::<Ping>().path("users").children([
                Route::new().path(":id").handler("ping"),
                Route::new().path(":name/posts").post().handler("ping"),
            ])])
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigurationError::ConflictingParamName {
                path: "/users/{name}/posts".into(),
                name: "name".into(),
                existing_path: "/users/{id}".into(),
                existing: "id".into(),
            }
        );
        assert!(server.entries().is_empty());
    }

    #[test]
    fn test_same_param_name_across_routes() {
        let mut server = RuttServer::new(ServerConfig::default());
        server
            .routes(&[Route::new().controller::<Ping>().path("users/:id").children([
                Route::new().handler("ping"),
                Route::new().path("posts/:postId").handler("ping"),
                Route::new().path("me").handler("ping"),
            ])])
            .unwrap();
        assert_eq!(server.entries().len(), 3);
        assert!(server.into_router().is_ok());
    }

    #[test]
    fn test_empty_param_name_rejected() {
        let mut server = RuttServer::new(ServerConfig::default());
        let err = server
            .routes(&[Route::new().controller::<Ping>().path("x/:").handler("ping")])
            .err()
            .unwrap();
        assert_eq!(err, ConfigurationError::EmptyParamName { path: "/x/{}".into() });
        assert!(server.entries().is_empty());
    }

    #[test]
    fn test_same_path_different_methods() {
        let mut server = RuttServer::new(ServerConfig::default());
        server
            .routes(&[Route::new().controller::<Ping>().path("ping").children([
                Route::new().get().handler("ping"),
                Route::new().post().handler("ping"),
            ])])
            .unwrap();
        assert_eq!(server.entries().len(), 2);
        assert!(server.into_router().is_ok());
    }

    #[test]
    fn test_failed_compile_keeps_previous_table() {
        let mut server = RuttServer::new(ServerConfig::default());
        server
            .routes(&[Route::new().controller::<Ping>().path("ping").handler("ping")])
            .unwrap();
        assert!(server
            .routes(&[Route::new().path("orphan").handler("ping")])
            .is_err());
        assert_eq!(server.entries().len(), 1);
    }
}
