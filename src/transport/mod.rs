//! Transport boundary: the fetch-style primitive the request core drives.
//!
//! The core never talks to the network itself. It hands a fully built
//! [`TransportRequest`] (final URL, headers, wire body, abort signal) to a
//! [`Transport`] and receives a [`Response`]. [`ReqwestTransport`] is the
//! default implementation; tests and embedders inject their own.

mod abort;
mod http;
mod response;

pub use abort::{AbortController, AbortSignal};
pub use http::ReqwestTransport;
pub use response::{ByteStream, Response};

use crate::types::Method;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;

/// Credentials mode derived from `with_credentials`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    SameOrigin,
    Include,
}

/// Wire-level request handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub credentials: Credentials,
    pub signal: AbortSignal,
}

/// Fetch-equivalent primitive.
///
/// Implementations should observe `request.signal` and fail with
/// [`Error::Cancelled`](crate::Error::Cancelled) when it fires; the core also
/// races every call against the signal, so a transport that ignores it still
/// settles promptly.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: TransportRequest) -> Result<Response>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport error: {0}")]
    Other(String),
}
