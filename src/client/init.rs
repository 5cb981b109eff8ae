//! Per-call overrides merged onto client defaults.

use crate::plugins::Plugin;
use crate::transport::AbortController;
use crate::types::{Method, QueryOptions, RequestBody};
use crate::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Options for one call. Unset fields fall back to the client defaults;
/// headers are merged per name (a name set here replaces the default's values).
#[derive(Clone, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub base_url: Option<String>,
    pub headers: HeaderMap,
    pub params: Option<Value>,
    pub data: Option<RequestBody>,
    pub timeout: Option<Duration>,
    pub with_credentials: Option<bool>,
    pub extra: HashMap<String, Value>,
    pub query_options: Option<QueryOptions>,
    /// Plugins applied to this call only.
    pub plugins: Vec<Arc<dyn Plugin>>,
    /// Use this controller instead of a fresh one. Not carried over by `retry`.
    pub controller: Option<AbortController>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Append a header; invalid names or values are skipped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.append(n, v);
            }
            _ => tracing::warn!(header = name, "skipping invalid request header"),
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Serialize `query` into the params object.
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Result<Self> {
        self.params = Some(serde_json::to_value(query)?);
        Ok(self)
    }

    pub fn data(mut self, data: impl Into<RequestBody>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.data = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send and store cookies. With `ReqwestTransport::from_env` these
    /// requests use a cookie jar shared by every credentialed request.
    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = Some(enabled);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn query_options(mut self, options: QueryOptions) -> Self {
        self.query_options = Some(options);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn controller(mut self, controller: AbortController) -> Self {
        self.controller = Some(controller);
        self
    }
}

impl fmt::Debug for RequestInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInit")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("data", &self.data)
            .field("timeout", &self.timeout)
            .field("with_credentials", &self.with_credentials)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}
