//! Shared fixtures: an in-memory transport that records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use plugfetch::transport::{Response, Transport, TransportError, TransportRequest};
use plugfetch::{Client, Error};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "https://api.example.com";

/// What the mock does for one call.
pub enum Reply {
    Respond(Response),
    /// Never settles; only the abort signal or a timeout ends the call.
    Pending,
    /// Settle after a delay.
    Delayed(Duration, Response),
    NetworkError(String),
}

type Responder = dyn Fn(usize, &TransportRequest) -> Reply + Send + Sync;

pub struct MockTransport {
    calls: Mutex<Vec<TransportRequest>>,
    count: AtomicUsize,
    responder: Box<Responder>,
}

impl MockTransport {
    /// `responder` receives the zero-based call index.
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(usize, &TransportRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
            responder: Box::new(responder),
        })
    }

    pub fn json(status: u16, body: Value) -> Arc<Self> {
        Self::new(move |_, _| Reply::Respond(Response::from_json(&body).with_status(status)))
    }

    pub fn text(body: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Reply::Respond(Response::from_text(body)))
    }

    /// Body delivered as one read per element.
    pub fn chunks(reads: Vec<&'static str>) -> Arc<Self> {
        Self::new(move |_, _| Reply::Respond(chunked(&reads)))
    }

    pub fn pending() -> Arc<Self> {
        Self::new(|_, _| Reply::Pending)
    }

    pub fn network_error(message: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Reply::NetworkError(message.to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> TransportRequest {
        self.calls().pop().expect("transport was never called")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: TransportRequest) -> plugfetch::Result<Response> {
        let index = self.count.fetch_add(1, Ordering::SeqCst);
        let reply = (self.responder)(index, &request);
        self.calls.lock().unwrap().push(request);
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Pending => std::future::pending().await,
            Reply::Delayed(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Reply::NetworkError(message) => Err(Error::Transport(TransportError::Network(message))),
        }
    }
}

/// A 200 response whose body arrives as one read per element.
pub fn chunked(reads: &[&'static str]) -> Response {
    let items: Vec<plugfetch::PipeResult<Bytes>> = reads
        .iter()
        .map(|s| Ok(Bytes::from_static(s.as_bytes())))
        .collect();
    Response::new(200, HeaderMap::new(), Box::pin(stream::iter(items)))
}

pub fn client(transport: Arc<MockTransport>) -> Client {
    Client::builder()
        .base_url(BASE_URL)
        .transport(transport)
        .build()
        .expect("client builds")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Counts calls from any thread.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ordered log of labels written by hooks.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, label: impl Into<String>) {
        self.0.lock().unwrap().push(label.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}
