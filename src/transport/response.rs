//! Transport response handle.
//!
//! A [`Response`] can be cloned into independent handles. Each handle may have
//! its body consumed once; the clones share one lazily buffered body, so a
//! full read through one handle can be repeated through another. Taking the
//! raw byte stream (see [`Response::body`]) before any full read hands the
//! underlying stream to that single consumer.

use crate::types::{Blob, FormData};
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Raw body byte stream.
pub type ByteStream = BoxStream<'static, Bytes>;

struct SharedBody {
    buffered: OnceCell<Bytes>,
    stream: Mutex<Option<ByteStream>>,
}

impl SharedBody {
    fn streaming(stream: ByteStream) -> Self {
        Self {
            buffered: OnceCell::new(),
            stream: Mutex::new(Some(stream)),
        }
    }

    fn buffered(bytes: Bytes) -> Self {
        Self {
            buffered: OnceCell::from(bytes),
            stream: Mutex::new(None),
        }
    }

    fn take_stream(&self) -> Result<ByteStream> {
        let mut slot = self
            .stream
            .lock()
            .map_err(|_| Error::BodyUsed("body lock poisoned".to_string()))?;
        slot.take()
            .ok_or_else(|| Error::BodyUsed("body stream already taken by a reader".to_string()))
    }

    async fn buffer(&self) -> Result<Bytes> {
        let bytes = self
            .buffered
            .get_or_try_init(|| async {
                let mut stream = self.take_stream()?;
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok::<_, Error>(buf.freeze())
            })
            .await?;
        Ok(bytes.clone())
    }
}

/// Response handed back by a [`Transport`](super::Transport).
pub struct Response {
    status: u16,
    status_text: String,
    headers: HeaderMap,
    url: String,
    body: Arc<SharedBody>,
    used: AtomicBool,
}

impl Response {
    /// Response whose body is read lazily from `body`.
    pub fn new(status: u16, headers: HeaderMap, body: ByteStream) -> Self {
        Self::with_body(status, headers, SharedBody::streaming(body))
    }

    /// Response with an in-memory body.
    pub fn from_parts(status: u16, headers: HeaderMap, body: Bytes) -> Self {
        Self::with_body(status, headers, SharedBody::buffered(body))
    }

    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self::from_parts(200, HeaderMap::new(), body.into())
    }

    pub fn from_text(body: impl Into<String>) -> Self {
        Self::from_bytes(Bytes::from(body.into()))
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        Self::from_bytes(Bytes::from(value.to_string()))
            .with_header("content-type", "application/json")
    }

    fn with_body(status: u16, headers: HeaderMap, body: SharedBody) -> Self {
        Self {
            status,
            status_text: canonical_reason(status),
            headers,
            url: String::new(),
            body: Arc::new(body),
            used: AtomicBool::new(false),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self.status_text = canonical_reason(status);
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Add a header; invalid names or values are skipped with a warning.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                self.headers.append(n, v);
            }
            _ => tracing::warn!(header = name, "skipping invalid response header"),
        }
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Status within 200-299.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether this handle's body has been consumed.
    pub fn body_used(&self) -> bool {
        self.used.load(Ordering::SeqCst)
    }

    fn mark_used(&self) -> Result<()> {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(Error::BodyUsed(
                "response body already read through this handle; clone it first".to_string(),
            ));
        }
        Ok(())
    }

    /// Raw body stream. Yields the buffered body as one chunk when a clone already read it.
    pub fn body(&self) -> Result<ByteStream> {
        self.mark_used()?;
        if let Some(b) = self.body.buffered.get() {
            let b = b.clone();
            return Ok(Box::pin(futures::stream::once(async move { Ok(b) })));
        }
        self.body.take_stream()
    }

    pub async fn bytes(&self) -> Result<Bytes> {
        self.mark_used()?;
        self.body.buffer().await
    }

    pub async fn array_buffer(&self) -> Result<Bytes> {
        self.bytes().await
    }

    pub async fn text(&self) -> Result<String> {
        let b = self.bytes().await?;
        Ok(String::from_utf8_lossy(&b).into_owned())
    }

    pub async fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let b = self.bytes().await?;
        Ok(serde_json::from_slice(&b)?)
    }

    pub async fn blob(&self) -> Result<Blob> {
        let data = self.bytes().await?;
        Ok(Blob {
            data,
            content_type: self.content_type().map(str::to_string),
        })
    }

    /// Parse a urlencoded or multipart body.
    pub async fn form_data(&self) -> Result<FormData> {
        let raw_type = self.content_type().unwrap_or_default().to_string();
        let content_type = raw_type.to_ascii_lowercase();
        let b = self.bytes().await?;
        if content_type.starts_with("multipart/form-data") {
            let boundary = crate::types::form::boundary_of(&raw_type).ok_or_else(|| {
                Error::decode_with_context(
                    "multipart response without boundary",
                    ErrorContext::new().with_field_path("headers.content-type"),
                )
            })?;
            FormData::parse_multipart(&b, &boundary)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            Ok(FormData::from_urlencoded(&b))
        } else {
            Err(Error::decode_with_context(
                "response is not form data",
                ErrorContext::new()
                    .with_field_path("headers.content-type")
                    .with_details(content_type),
            ))
        }
    }
}

impl Clone for Response {
    /// Independent handle over the same body; its consumed flag starts fresh.
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            url: self.url.clone(),
            body: Arc::clone(&self.body),
            used: AtomicBool::new(false),
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body_used", &self.body_used())
            .finish()
    }
}

fn canonical_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default()
        .to_string()
}
