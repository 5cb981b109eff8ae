//! Core type definitions: request configuration, bodies, materialized values and stream chunks.

pub mod body;
pub mod chunk;
pub mod config;
pub mod form;
pub mod value;

pub use body::RequestBody;
pub use chunk::{ChunkData, StreamChunk};
pub use config::{ArrayFormat, Method, QueryOptions, RequestConfig, Resolved, Resolver};
pub use form::{FilePart, FormData, FormValue};
pub use value::{Blob, FromResponseValue, ResponseType, ResponseValue};
