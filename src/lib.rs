//! # plugfetch
//!
//! 可等待的 HTTP 请求对象，配合按优先级排序的插件管线、流式解码以及中止/重试控制。
//!
//! Awaitable HTTP requests with a prioritized plugin pipeline, streaming decode
//! and abort/retry controls.
//!
//! ## Overview
//!
//! A [`Client`] holds shared defaults (base URL, headers, timeout, plugins) and
//! produces one [`Request`] per call. The request starts its workflow as soon
//! as it is built: plugins shape the configuration, the transport is raced
//! against the timeout and the abort signal, and the outcome waits for a
//! consumer. Consumers pick a materializer (`json`, `text`, `blob`, ...) or the
//! chunk stream; each consumption runs the `after_response` hooks and then the
//! `on_finally` hooks exactly once.
//!
//! ## Core Ideas
//!
//! - **Plugins everywhere**: six hooks, ordered by priority with stable ties
//! - **One error shape**: every failure becomes a [`RequestError`] with a [`ErrorKind`]
//! - **Streaming-first**: hooks may fan one read out into many chunks
//! - **Injectable transport**: [`transport::Transport`] is a trait; reqwest is the default
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plugfetch::{Client, RequestInit};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")
//!         .timeout(std::time::Duration::from_secs(10))
//!         .build()?;
//!
//!     let users = client
//!         .get("/users", RequestInit::new().params(json!({"page": 1, "limit": 10})))
//!         .await?;
//!     println!("{users}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client, builder, per-call options and the request object |
//! | [`plugins`] | Plugin trait, closure plugins and hook composition |
//! | [`pipeline`] | Chunk stream pipeline and SSE / NDJSON decoders |
//! | [`transport`] | Transport trait, reqwest transport, response and abort primitives |
//! | [`types`] | Request configuration, bodies, materialized values and chunks |
//! | [`utils`] | URL and body builders |
//! | [`cache`] | Response cache and request dedupe plugins |
//! | [`adapters`] | Loading-state wrappers driving one request per call |

pub mod adapters;
pub mod cache;
pub mod client;
pub mod pipeline;
pub mod plugins;
pub mod transport;
pub mod types;
pub mod utils;

pub use client::{Client, ClientBuilder, ClientOptions, InflightSnapshot, Request, RequestInit};
pub use pipeline::{ChunkStream, NdjsonPlugin, SsePlugin};
pub use plugins::{FnPlugin, HookType, Plugin, PluginPriority};
pub use transport::{AbortController, AbortSignal, Response, Transport};
pub use types::{ChunkData, Method, RequestBody, RequestConfig, StreamChunk};

use futures::Stream;
use std::pin::Pin;

/// Result type for hooks, transports and builders.
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Result type for everything a request consumer sees.
pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ErrorOrigin, RequestError};

pub mod error_kind;
pub use error_kind::ErrorKind;
