//! Per-request execution: guards, handler dispatch and error translation.
//!
//! ```text
//! Pending → GuardsRunning ─┬─▶ ShortCircuited ───────────────┐
//!                          ├─▶ Error ──(translate)───────────┤
//!                          └─▶ GuardsPassed → HandlerRunning ┤
//!                                    ├─▶ Replied ────────────┤
//!                                    └─▶ Error ──(translate)─┴─▶ ResponseSent
//! ```

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use crate::http::{DispatchState, Reply, ResponseControl, RouteRequest};
use crate::observability::logging::RouteLogger;
use crate::routing::controller::BoundMethod;
use crate::routing::error::HttpError;
use crate::routing::route::Guard;

/// Outcome of the guard pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Passed,
    ShortCircuited,
}

/// Everything a compiled leaf needs to serve a request.
pub(crate) struct Pipeline {
    pub method: Method,
    pub path: String,
    pub guards: Vec<Guard>,
    pub target: BoundMethod,
    pub logger: Arc<dyn RouteLogger>,
}

impl Pipeline {
    /// Serve one request. Always leaves exactly one reply on `control`.
    pub async fn run(&self, req: RouteRequest, control: ResponseControl) {
        let result = match run_guards(&self.guards, &req, &control).await {
            Ok(GuardOutcome::ShortCircuited) => Ok(()),
            Ok(GuardOutcome::Passed) => dispatch(&self.target, req, &control).await,
            Err(err) => Err(err),
        };

        if let Err(err) = result {
            control.transition(DispatchState::Error);
            translate_error(err, &control, &*self.logger, &self.method, &self.path);
        }
        control.transition(DispatchState::ResponseSent);
    }
}

/// Run `guards` in order, stopping at the first one that replies or fails.
pub async fn run_guards(
    guards: &[Guard],
    req: &RouteRequest,
    control: &ResponseControl,
) -> anyhow::Result<GuardOutcome> {
    control.transition(DispatchState::GuardsRunning);
    for guard in guards {
        guard(req.clone(), control.clone()).await?;
        if control.is_replied() {
            control.transition(DispatchState::ShortCircuited);
            return Ok(GuardOutcome::ShortCircuited);
        }
    }
    control.transition(DispatchState::GuardsPassed);
    Ok(GuardOutcome::Passed)
}

/// Invoke the handler and turn its value into a reply.
///
/// `null` becomes 204 No Content; any other value is a 200 JSON body.
pub async fn dispatch(
    target: &BoundMethod,
    req: RouteRequest,
    control: &ResponseControl,
) -> anyhow::Result<()> {
    control.transition(DispatchState::HandlerRunning);
    let value = target(req, control.clone()).await?;

    if !control.is_replied() {
        let reply = match value {
            Value::Null => Reply::no_content(),
            value => Reply::json(value),
        };
        control.send(reply);
    }
    control.transition(DispatchState::Replied);
    Ok(())
}

/// Convert a guard or handler failure into a reply.
///
/// Failures after a reply are dropped. [`HttpError`]s pass through as-is.
/// Anything else is logged once and answered with a 500 that carries the
/// message and trace.
pub fn translate_error(
    err: anyhow::Error,
    control: &ResponseControl,
    logger: &dyn RouteLogger,
    method: &Method,
    path: &str,
) {
    if control.is_replied() {
        return;
    }

    if let Some(http) = err.downcast_ref::<HttpError>() {
        control.send(http.to_reply());
        return;
    }

    logger.unhandled_error(method, path, &err);
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    control.send(
        Reply::json(json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or("Internal Server Error"),
            "message": err.to_string(),
            "trace": format!("{:?}", err),
        }))
        .with_status(status),
    );
}
