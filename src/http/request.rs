//! Request view handed to guards and handlers.
//!
//! # Responsibilities
//! - Carry method, URI, headers, path parameters and the buffered body
//! - Decode JSON bodies into typed values
//! - Expose the request ID set by the middleware stack
//!
//! # Design Decisions
//! - Body is buffered before dispatch so guards and handlers can all read it
//! - Cloning is cheap (shared inner parts)

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Uri},
};
use serde::de::DeserializeOwned;

use crate::routing::HttpError;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone)]
struct RequestParts {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    body: Bytes,
}

/// An incoming request after routing.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    inner: Arc<RequestParts>,
}

impl RouteRequest {
    /// Build a request with no headers, parameters or body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            inner: Arc::new(RequestParts {
                method,
                uri,
                headers: HeaderMap::new(),
                params: HashMap::new(),
                body: Bytes::new(),
            }),
        }
    }

    /// Build a request from server-side parts.
    pub fn from_parts(parts: Parts, params: HashMap<String, String>, body: Bytes) -> Self {
        Self {
            inner: Arc::new(RequestParts {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                params,
                body,
            }),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner)
            .params
            .insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        Arc::make_mut(&mut self.inner).headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        Arc::make_mut(&mut self.inner).body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.inner.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path parameter captured by the route pattern.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.inner.params
    }

    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// Decode the body as JSON.
    ///
    /// Malformed input maps to a 400 [`HttpError`].
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.inner.body)
            .map_err(|e| HttpError::bad_request(format!("Invalid request payload JSON: {}", e)))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }
}
