//! Routing error types.
//!
//! Two families live here:
//! - [`ConfigurationError`]: structural defects in a route tree, raised while
//!   compiling or registering it. Always fatal at startup.
//! - [`HttpError`]: a failure that already knows which response it maps to.
//!   Guards and handlers return it (wrapped in `anyhow::Error`) and it is
//!   passed through to the client unchanged.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::http::response::Reply;

/// Errors detected while turning a route tree into a dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A leaf declares a handler but no controller is declared on it or on
    /// any of its ancestors.
    #[error("cannot register handler `{handler}` at {path} without an existing controller")]
    MissingController { handler: String, path: String },

    /// The resolved controller does not expose the named handler.
    #[error("handler `{handler}` does not exist on controller {controller}")]
    UnknownHandler { handler: String, controller: String },

    /// Two entries compiled to the same method and path.
    #[error("route [{method}] {path} is declared more than once")]
    DuplicateRoute { method: Method, path: String },

    /// The server cannot route this method.
    #[error("method {method} is not supported for route {path}")]
    UnsupportedMethod { method: Method, path: String },

    /// A `:` segment without a parameter name.
    #[error("route {path} declares a parameter without a name")]
    EmptyParamName { path: String },

    /// Two routes share a prefix but name the parameter at the same position
    /// differently.
    #[error("route {path} names parameter `{name}` where {existing_path} already uses `{existing}`")]
    ConflictingParamName {
        path: String,
        name: String,
        existing_path: String,
        existing: String,
    },
}

/// A pre-formed HTTP error.
///
/// The response body follows the familiar `{statusCode, error, message}`
/// shape, optionally extended with a `data` field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    data: Option<Value>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attach structured detail to the response body.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// JSON body sent to the client.
    pub fn body(&self) -> Value {
        let mut body = json!({
            "statusCode": self.status.as_u16(),
            "error": self.status.canonical_reason().unwrap_or("Unknown"),
            "message": self.message,
        });
        if let (Some(data), Some(map)) = (&self.data, body.as_object_mut()) {
            map.insert("data".to_string(), data.clone());
        }
        body
    }

    /// The response instruction for this error.
    pub fn to_reply(&self) -> Reply {
        Reply::json(self.body()).with_status(self.status)
    }
}
