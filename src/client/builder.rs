use crate::client::core::{Client, ClientDefaults};
use crate::plugins::{Plugin, PluginRegistry};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::QueryOptions;
use crate::{Error, ErrorContext, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Serializable client defaults, loadable from YAML.
///
/// ```yaml
/// base_url: https://api.example.com
/// timeout_ms: 5000
/// headers:
///   accept: application/json
/// query:
///   array_format: brackets
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub base_url: String,
    /// Zero disables the timeout.
    pub timeout_ms: u64,
    pub headers: BTreeMap<String, String>,
    pub with_credentials: bool,
    pub query: QueryOptions,
}

impl ClientOptions {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid client options: {}", e),
                ErrorContext::new().with_source("client_options"),
            )
        })
    }

    pub async fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("failed to read client options: {}", e),
                ErrorContext::new()
                    .with_field_path(path.to_string_lossy())
                    .with_source("client_options"),
            )
        })?;
        Self::from_yaml_str(&content)
    }
}

/// Builder for creating clients with custom configuration.
pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    headers: HeaderMap,
    with_credentials: bool,
    query_options: QueryOptions,
    plugins: Vec<Arc<dyn Plugin>>,
    transport: Option<Arc<dyn Transport>>,
    invalid_headers: Vec<String>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::ZERO,
            headers: HeaderMap::new(),
            with_credentials: false,
            query_options: QueryOptions::default(),
            plugins: Vec::new(),
            transport: None,
            invalid_headers: Vec::new(),
        }
    }

    /// Start from environment defaults:
    /// - `PLUGFETCH_BASE_URL`
    /// - `PLUGFETCH_TIMEOUT_MS` (0 disables)
    /// - `PLUGFETCH_WITH_CREDENTIALS` (`1` or `true`)
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Ok(base_url) = std::env::var("PLUGFETCH_BASE_URL") {
            builder.base_url = base_url;
        }
        if let Some(ms) = std::env::var("PLUGFETCH_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            builder.timeout = Duration::from_millis(ms);
        }
        if let Ok(v) = std::env::var("PLUGFETCH_WITH_CREDENTIALS") {
            builder.with_credentials = matches!(v.trim(), "1" | "true" | "TRUE" | "True");
        }
        builder
    }

    /// Start from deserialized options.
    pub fn from_options(options: ClientOptions) -> Self {
        let mut builder = Self::new()
            .base_url(options.base_url)
            .timeout(Duration::from_millis(options.timeout_ms))
            .with_credentials(options.with_credentials)
            .query_options(options.query);
        for (name, value) in &options.headers {
            builder = builder.header(name, value);
        }
        builder
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default timeout for every request. Zero disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a default header. Invalid headers are reported by [`build`](Self::build).
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.append(n, v);
            }
            _ => self.invalid_headers.push(name.to_string()),
        }
        self
    }

    /// Send and store cookies. With `ReqwestTransport::from_env` these
    /// requests use a cookie jar shared by every credentialed request.
    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    pub fn query_options(mut self, options: QueryOptions) -> Self {
        self.query_options = options;
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Inject a transport. Defaults to [`ReqwestTransport::shared`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        if !self.invalid_headers.is_empty() {
            return Err(Error::configuration_with_context(
                "invalid default header",
                ErrorContext::new()
                    .with_field_path("headers")
                    .with_details(self.invalid_headers.join(", ")),
            ));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => ReqwestTransport::shared()?,
        };

        tracing::debug!(
            base_url = %self.base_url,
            timeout_ms = self.timeout.as_millis(),
            plugins = self.plugins.len(),
            "building client"
        );

        Ok(Client::from_parts(
            ClientDefaults {
                base_url: self.base_url,
                timeout: self.timeout,
                headers: self.headers,
                with_credentials: self.with_credentials,
                query_options: self.query_options,
            },
            transport,
            PluginRegistry::with_plugins(self.plugins),
        ))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArrayFormat;

    #[test]
    fn options_load_from_yaml() {
        let options = ClientOptions::from_yaml_str(
            "base_url: https://api.example.com\ntimeout_ms: 250\nheaders:\n  accept: application/json\nquery:\n  array_format: brackets\n",
        )
        .unwrap();
        assert_eq!(options.base_url, "https://api.example.com");
        assert_eq!(options.timeout_ms, 250);
        assert_eq!(options.headers.get("accept").map(String::as_str), Some("application/json"));
        assert_eq!(options.query.array_format, ArrayFormat::Brackets);
        assert!(options.query.skip_nulls);
    }

    #[test]
    fn malformed_yaml_is_a_configuration_error() {
        let err = ClientOptions::from_yaml_str("timeout_ms: [1, 2").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn invalid_headers_fail_the_build() {
        let result = ClientBuilder::new().header("bad header", "x").build();
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }
}
