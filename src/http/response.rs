//! Response instructions and per-request response control.
//!
//! # Responsibilities
//! - Describe a response independently of the server ([`Reply`])
//! - Give guards and handlers a way to reply directly ([`ResponseControl`])
//! - Track the dispatch state of a request ([`DispatchState`])
//!
//! # Design Decisions
//! - First reply wins: once a reply is recorded, later ones are ignored
//! - Dispatch state lives next to the reply so every stage reads the same source
//! - JSON bodies; an absent body means an empty response

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    http::{header::HeaderName, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// A response instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
}

impl Reply {
    /// A 200 response carrying a JSON body.
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// An empty 204 response.
    pub fn no_content() -> Self {
        Self::empty(StatusCode::NO_CONTENT)
    }

    /// An empty response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, self.headers, Json(body)).into_response(),
            None => (self.status, self.headers).into_response(),
        }
    }
}

/// Where a request is in its dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    GuardsRunning,
    ShortCircuited,
    GuardsPassed,
    HandlerRunning,
    Replied,
    Error,
    ResponseSent,
}

#[derive(Debug)]
struct Exchange {
    state: DispatchState,
    reply: Option<Reply>,
}

/// Per-request handle used to reply and to observe whether a reply exists.
///
/// Cheap to clone; all clones refer to the same request.
#[derive(Debug, Clone)]
pub struct ResponseControl {
    inner: Arc<Mutex<Exchange>>,
}

impl ResponseControl {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Exchange {
                state: DispatchState::Pending,
                reply: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Exchange> {
        // A panic while holding the lock leaves the exchange consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the reply for this request.
    ///
    /// Returns `false` and discards `reply` if one was already recorded.
    pub fn send(&self, reply: Reply) -> bool {
        let mut exchange = self.lock();
        if exchange.reply.is_some() {
            tracing::debug!(status = %reply.status(), "Reply already sent, ignoring");
            return false;
        }
        exchange.reply = Some(reply);
        true
    }

    /// Reply with a JSON body and status 200.
    pub fn json(&self, body: Value) -> bool {
        self.send(Reply::json(body))
    }

    /// Whether a reply has been recorded.
    pub fn is_replied(&self) -> bool {
        self.lock().reply.is_some()
    }

    pub fn state(&self) -> DispatchState {
        self.lock().state
    }

    pub(crate) fn transition(&self, state: DispatchState) {
        let mut exchange = self.lock();
        tracing::trace!(from = ?exchange.state, to = ?state, "Dispatch state");
        exchange.state = state;
    }

    /// Copy of the recorded reply.
    pub fn reply(&self) -> Option<Reply> {
        self.lock().reply.clone()
    }

    /// Move the recorded reply out, leaving the exchange empty.
    pub fn take_reply(&self) -> Option<Reply> {
        self.lock().reply.take()
    }
}

impl Default for ResponseControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_reply_wins() {
        let control = ResponseControl::new();
        assert!(!control.is_replied());

        assert!(control.json(json!({"first": true})));
        assert!(!control.send(Reply::empty(StatusCode::IM_A_TEAPOT)));

        let reply = control.reply().unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.body(), Some(&json!({"first": true})));
    }

    #[test]
    fn test_clones_share_exchange() {
        let control = ResponseControl::new();
        let clone = control.clone();
        clone.send(Reply::no_content());
        assert!(control.is_replied());

        control.transition(DispatchState::Replied);
        assert_eq!(clone.state(), DispatchState::Replied);
    }

    #[test]
    fn test_reply_into_response() {
        let response = Reply::no_content().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = Reply::json(json!([1, 2]))
            .with_status(StatusCode::CREATED)
            .with_header(
                HeaderName::from_static("x-route"),
                HeaderValue::from_static("users"),
            )
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-route"], "users");
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
