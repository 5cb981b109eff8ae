//! Per-request configuration.

use crate::transport::Response;
use crate::types::body::RequestBody;
use crate::Result;
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// HTTP method understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Whether `data` is serialized into a request body for this method.
    pub fn carries_body(&self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(crate::Error::configuration_with_context(
                format!("unsupported HTTP method: {}", other),
                crate::ErrorContext::new().with_field_path("config.method"),
            )),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// How arrays inside query params are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayFormat {
    /// `a[]=1&a[]=2`
    Brackets,
    /// `a[0]=1&a[1]=2`
    Indices,
    /// `a=1&a=2`
    #[default]
    Repeat,
    /// `a=1,2`
    Comma,
}

/// Query-string serialization options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub array_format: ArrayFormat,
    /// Drop keys whose value is `null` instead of writing `key=`.
    pub skip_nulls: bool,
    /// Percent-encode keys and values.
    pub encode: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            array_format: ArrayFormat::default(),
            skip_nulls: true,
            encode: true,
        }
    }
}

/// A value a short-circuit resolver hands back instead of a transport response.
#[derive(Debug)]
pub enum Resolved {
    Response(Response),
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl Resolved {
    /// Wrap plain values in a 200 response; responses are adopted as-is.
    pub fn into_response(self) -> Response {
        match self {
            Resolved::Response(r) => r,
            Resolved::Json(v) => Response::from_json(&v),
            Resolved::Text(s) => Response::from_text(s),
            Resolved::Bytes(b) => Response::from_bytes(b),
        }
    }
}

impl From<Response> for Resolved {
    fn from(r: Response) -> Self {
        Resolved::Response(r)
    }
}

impl From<Value> for Resolved {
    fn from(v: Value) -> Self {
        Resolved::Json(v)
    }
}

impl From<String> for Resolved {
    fn from(s: String) -> Self {
        Resolved::Text(s)
    }
}

impl From<Bytes> for Resolved {
    fn from(b: Bytes) -> Self {
        Resolved::Bytes(b)
    }
}

type ResolveFn = dyn Fn() -> BoxFuture<'static, Result<Resolved>> + Send + Sync;

/// Short-circuit thunk. When present on a configuration the transport is never invoked.
#[derive(Clone)]
pub struct Resolver(Arc<ResolveFn>);

impl Resolver {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Resolved>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Resolver that always yields a clone of `response`.
    pub fn response(response: Response) -> Self {
        Self::new(move || {
            let r = response.clone();
            Box::pin(async move { Ok(Resolved::Response(r)) })
        })
    }

    pub async fn resolve(&self) -> Result<Resolved> {
        (self.0)().await
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver(..)")
    }
}

/// Full configuration of one request, as seen by plugins.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub url: String,
    pub base_url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub params: Option<Value>,
    pub data: Option<RequestBody>,
    /// Zero disables the timeout.
    pub timeout: Duration,
    pub with_credentials: bool,
    /// Opaque bag passed to plugins untouched.
    pub extra: HashMap<String, Value>,
    pub query_options: QueryOptions,
    pub resolve: Option<Resolver>,
}

impl RequestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_data(mut self, data: impl Into<RequestBody>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Insert or replace a header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| crate::Error::Header(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| crate::Error::Header(format!("{}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Short-circuit this request with `resolver`.
    pub fn set_resolve(&mut self, resolver: Resolver) {
        self.resolve = Some(resolver);
    }

    /// Timeout as an option; `None` when disabled.
    pub fn effective_timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}
