//! Shared utilities for integration tests.

use std::sync::{Arc, Mutex};

use axum::http::Method;
use rutt::observability::RouteLogger;
use rutt::{Route, RuttServer, ServerConfig, ServerHandle};
use tokio::net::TcpListener;

/// Logger that keeps every event for assertions.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    pub registered: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl RouteLogger for RecordingLogger {
    fn route_registered(&self, method: &Method, path: &str) {
        self.registered
            .lock()
            .unwrap()
            .push(format!("[{}] {}", method, path));
    }

    fn unhandled_error(&self, _method: &Method, path: &str, error: &anyhow::Error) {
        self.errors
            .lock()
            .unwrap()
            .push(format!("{}: {}", path, error));
    }
}

/// A server running on an ephemeral localhost port.
pub struct TestServer {
    pub handle: ServerHandle,
    pub logger: Arc<RecordingLogger>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.handle.local_addr(), path)
    }
}

/// Compile `routes` and serve them with a recording logger.
#[allow(dead_code)]
pub async fn start_server(routes: Vec<Route>) -> TestServer {
    start_configured(routes, ServerConfig::default(), |_| {}).await
}

/// Like [`start_server`], with a custom config and a hook to register plugins.
pub async fn start_configured<F>(routes: Vec<Route>, config: ServerConfig, setup: F) -> TestServer
where
    F: FnOnce(&mut RuttServer),
{
    let logger = Arc::new(RecordingLogger::default());
    let mut server = RuttServer::with_logger(config, logger.clone());
    server.routes(&routes).expect("route tree should compile");
    setup(&mut server);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let handle = server.start_on(listener).await.expect("server should start");

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        handle,
        logger,
        client,
    }
}
