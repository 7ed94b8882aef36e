//! rutt demo server.
//!
//! Serves a small users API declared as a route tree:
//!
//! ```text
//! [GET]    /health                 (plugin)
//! [GET]    /users
//! [POST]   /users                  (bearer guard)
//! [GET]    /users/{id}
//! [DELETE] /users/{id}             (bearer guard)
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{http::StatusCode, routing::get, Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};

use rutt::config::{load_config, ServerConfig};
use rutt::lifecycle::shutdown_signal;
use rutt::observability::{logging, metrics};
use rutt::routing::{guard, Guard};
use rutt::{
    Controller, HandlerTable, HttpError, ParamRule, Reply, ResponseControl, Route, RouteRequest,
    RuttServer,
};

#[derive(Parser)]
#[command(name = "rutt")]
#[command(about = "Demo server for tree-declared routes", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

/// In-memory users store. Shared by every route under its declaring node.
#[derive(Default)]
struct UsersController {
    next_id: AtomicU64,
    users: Mutex<BTreeMap<u64, User>>,
}

impl UsersController {
    fn store(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, User>> {
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn id_param(req: &RouteRequest) -> Result<u64, HttpError> {
        req.param("id")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| HttpError::bad_request("Invalid user id"))
    }
}

impl Controller for UsersController {
    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .handler("list", |this: Arc<Self>, _req, _res| async move {
                Ok(this.store().values().cloned().collect::<Vec<_>>())
            })
            .handler("get", |this: Arc<Self>, req: RouteRequest, _res| async move {
                let id = Self::id_param(&req)?;
                let user = this.store().get(&id).cloned();
                user.ok_or_else(|| anyhow::Error::from(HttpError::not_found(format!("User {} not found", id))))
            })
            .handler(
                "create",
                |this: Arc<Self>, req: RouteRequest, res: ResponseControl| async move {
                    let new: NewUser = req.json()?;
                    let id = this.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                    let user = User { id, name: new.name };
                    this.store().insert(id, user.clone());
                    res.send(Reply::json(serde_json::to_value(&user)?).with_status(StatusCode::CREATED));
                    Ok(())
                },
            )
            .handler("remove", |this: Arc<Self>, req: RouteRequest, _res| async move {
                let id = Self::id_param(&req)?;
                match this.store().remove(&id) {
                    Some(_) => Ok(()),
                    None => Err(HttpError::not_found(format!("User {} not found", id)).into()),
                }
            })
    }
}

fn require_bearer() -> Guard {
    guard(|req: RouteRequest, res: ResponseControl| async move {
        let authorized = req
            .header("authorization")
            .is_some_and(|value| value.starts_with("Bearer "));
        if !authorized {
            res.send(HttpError::unauthorized("Missing bearer token").to_reply());
        }
        Ok(())
    })
}

fn routes() -> Vec<Route> {
    vec![Route::new().controller::<UsersController>().child(
        Route::new()
            .path("users")
            .config("tags", serde_json::json!(["users"]))
            .children([
                Route::new().get().handler("list"),
                Route::new().post().with_guard(require_bearer()).handler("create"),
                Route::new()
                    .path(":id")
                    .validate_param("id", ParamRule::Integer)
                    .children([
                        Route::new().get().handler("get"),
                        Route::new().delete().with_guard(require_bearer()).handler("remove"),
                    ]),
            ]),
    )]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level)?;
    tracing::info!("rutt v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let health = Router::new().route(
        "/health",
        get(|| async { Json(serde_json::json!({"status": "ok"})) }),
    );

    let mut server = RuttServer::new(config);
    server.routes(&routes())?.register(health);

    let handle = server.start().await?;
    let stopper = handle.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        stopper.trigger();
    });

    handle.wait().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
