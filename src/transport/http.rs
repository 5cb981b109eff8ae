use super::{Credentials, Response, Transport, TransportError, TransportRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use once_cell::sync::OnceCell;
use reqwest::Proxy;
use std::env;
use std::sync::Arc;
use std::time::Duration;

static SHARED: OnceCell<Arc<ReqwestTransport>> = OnceCell::new();

/// Default transport backed by a pooled `reqwest::Client`.
///
/// Requests sent with credentials go through a second client that keeps a
/// cookie jar; other requests never send or store cookies.
/// Per-request timeouts are enforced by the request core, not here.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentialed: reqwest::Client,
}

impl ReqwestTransport {
    /// Use one caller-configured client for every request. Cookies are only
    /// kept if that client was built with `cookie_store(true)`.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            credentialed: client.clone(),
            client,
        }
    }

    /// Replace the client used for requests sent with credentials.
    pub fn with_credentialed_client(mut self, client: reqwest::Client) -> Self {
        self.credentialed = client;
        self
    }

    /// Build clients with production-friendly defaults (env-overridable).
    pub fn from_env() -> Result<Self> {
        let client = builder_from_env().build().map_err(build_error)?;
        let credentialed = builder_from_env()
            .cookie_store(true)
            .build()
            .map_err(build_error)?;
        Ok(Self {
            client,
            credentialed,
        })
    }

    /// Process-wide transport built from the environment on first use, so
    /// clients without an explicit transport share one connection pool.
    pub fn shared() -> Result<Arc<Self>> {
        SHARED
            .get_or_try_init(|| Self::from_env().map(Arc::new))
            .map(Arc::clone)
    }
}

fn build_error(e: reqwest::Error) -> Error {
    Error::Transport(TransportError::Other(e.to_string()))
}

fn builder_from_env() -> reqwest::ClientBuilder {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(
            env::var("PLUGFETCH_HTTP_POOL_MAX_IDLE_PER_HOST")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(32),
        )
        .pool_idle_timeout(Some(Duration::from_secs(
            env::var("PLUGFETCH_HTTP_POOL_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(90),
        )));

    if let Ok(proxy_url) = env::var("PLUGFETCH_PROXY_URL") {
        match Proxy::all(&proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => tracing::warn!(error = %e, "ignoring invalid PLUGFETCH_PROXY_URL"),
        }
    }
    builder
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<Response> {
        let TransportRequest {
            url,
            method,
            headers,
            body,
            credentials,
            signal,
        } = request;

        let client = match credentials {
            Credentials::Include => {
                tracing::trace!(url = %url, "sending with cookie jar");
                &self.credentialed
            }
            Credentials::SameOrigin => &self.client,
        };
        let mut req = client.request(method.into(), &url).headers(headers);
        if let Some(body) = body {
            req = req.body(body);
        }

        let resp = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(Error::Cancelled),
            r = req.send() => r.map_err(|e| Error::Transport(TransportError::Http(e)))?,
        };

        let status = resp.status();
        let headers = resp.headers().clone();
        let final_url = resp.url().to_string();
        let body = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));

        let mut response = Response::new(status.as_u16(), headers, Box::pin(body)).with_url(final_url);
        if let Some(reason) = status.canonical_reason() {
            response = response.with_status_text(reason);
        }
        Ok(response)
    }
}
