use super::builder::ClientBuilder;
use super::init::RequestInit;
use super::request::{Request, RequestOptions};
use super::signals::{InflightSet, InflightSnapshot};
use crate::plugins::{Plugin, PluginRegistry};
use crate::transport::Transport;
use crate::types::{FormData, Method, QueryOptions, RequestBody, RequestConfig};
use crate::utils::{upload_form, UploadValue};
use reqwest::header::HeaderMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Defaults shared by every request of one client.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClientDefaults {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) headers: HeaderMap,
    pub(crate) with_credentials: bool,
    pub(crate) query_options: QueryOptions,
}

struct ClientInner {
    defaults: ClientDefaults,
    transport: Arc<dyn Transport>,
    registry: PluginRegistry,
    inflight: Arc<InflightSet>,
}

/// A configured HTTP client.
///
/// Cloning is cheap and shares defaults, plugins and in-flight tracking.
///
/// ```rust,no_run
/// use plugfetch::{Client, RequestInit};
/// use serde_json::json;
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .build()?;
///
/// let users = client
///     .get("/users", RequestInit::new().params(json!({"page": 1, "limit": 10})))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        defaults: ClientDefaults,
        transport: Arc<dyn Transport>,
        registry: PluginRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                defaults,
                transport,
                registry,
                inflight: Arc::new(InflightSet::default()),
            }),
        }
    }

    /// Register a plugin for all subsequent requests.
    pub fn use_plugin(&self, plugin: Arc<dyn Plugin>) -> &Self {
        self.inner.registry.register(plugin);
        self
    }

    pub fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        self.inner.registry.list()
    }

    /// Start a request. The workflow begins immediately.
    pub fn request(&self, url: impl Into<String>, init: RequestInit) -> Request {
        let RequestInit {
            method,
            base_url,
            headers,
            params,
            data,
            timeout,
            with_credentials,
            extra,
            query_options,
            plugins,
            controller,
        } = init;
        let defaults = &self.inner.defaults;

        let config = RequestConfig {
            url: url.into(),
            base_url: base_url.unwrap_or_else(|| defaults.base_url.clone()),
            method: method.unwrap_or_default(),
            headers: merge_headers(&defaults.headers, headers),
            params,
            data,
            timeout: timeout.unwrap_or(defaults.timeout),
            with_credentials: with_credentials.unwrap_or(defaults.with_credentials),
            extra,
            query_options: query_options.unwrap_or_else(|| defaults.query_options.clone()),
            resolve: None,
        };

        let composition = self.inner.registry.composition().with_extras(&plugins);
        Request::from_options(RequestOptions {
            config,
            composition,
            transport: Arc::clone(&self.inner.transport),
            inflight: Some(Arc::clone(&self.inner.inflight)),
            controller,
        })
    }

    /// Abort every request that has not finalized yet.
    pub fn abort_all(&self) {
        let aborted = self.inner.inflight.abort_all();
        tracing::debug!(aborted, "aborted in-flight requests");
    }

    pub fn inflight(&self) -> InflightSnapshot {
        self.inner.inflight.snapshot()
    }

    pub fn get(&self, url: impl Into<String>, init: RequestInit) -> Request {
        self.request(url, init.method(Method::Get))
    }

    pub fn head(&self, url: impl Into<String>, init: RequestInit) -> Request {
        self.request(url, init.method(Method::Head))
    }

    pub fn delete(&self, url: impl Into<String>, init: RequestInit) -> Request {
        self.request(url, init.method(Method::Delete))
    }

    pub fn options(&self, url: impl Into<String>, init: RequestInit) -> Request {
        self.request(url, init.method(Method::Options))
    }

    pub fn post(&self, url: impl Into<String>, data: impl Into<RequestBody>, init: RequestInit) -> Request {
        self.request(url, init.method(Method::Post).data(data))
    }

    pub fn put(&self, url: impl Into<String>, data: impl Into<RequestBody>, init: RequestInit) -> Request {
        self.request(url, init.method(Method::Put).data(data))
    }

    pub fn patch(&self, url: impl Into<String>, data: impl Into<RequestBody>, init: RequestInit) -> Request {
        self.request(url, init.method(Method::Patch).data(data))
    }

    /// POST a multipart form built from `fields`: files as-is, everything else stringified.
    pub fn upload<K, V, I>(&self, url: impl Into<String>, fields: I, init: RequestInit) -> Request
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<UploadValue>,
    {
        let form: FormData = upload_form(fields);
        self.post(url, form, init)
    }
}

fn merge_headers(defaults: &HeaderMap, overrides: HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    let mut current = None;
    for (name, value) in overrides {
        // `None` names continue the previous header's values.
        if let Some(name) = name {
            merged.remove(&name);
            current = Some(name);
        }
        if let Some(name) = &current {
            merged.append(name.clone(), value);
        }
    }
    merged
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .field("plugins", &self.inner.registry)
            .field("inflight", &self.inflight().count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn override_headers_replace_per_name() {
        let mut defaults = HeaderMap::new();
        defaults.insert("accept", HeaderValue::from_static("application/json"));
        defaults.insert("x-team", HeaderValue::from_static("core"));

        let mut overrides = HeaderMap::new();
        overrides.append("x-team", HeaderValue::from_static("a"));
        overrides.append("x-team", HeaderValue::from_static("b"));

        let merged = merge_headers(&defaults, overrides);
        assert_eq!(merged.get("accept").unwrap(), "application/json");
        let teams: Vec<_> = merged.get_all("x-team").iter().collect();
        assert_eq!(teams, vec!["a", "b"]);
    }
}
