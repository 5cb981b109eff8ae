//! Units yielded by the stream materializer.

use crate::error::RequestError;
use crate::BoxStream;
use bytes::Bytes;
use serde_json::Value;
use std::fmt;

/// Processed value of a chunk.
///
/// `Iter` and `Stream` are fan-out markers: a `transform_stream_chunk` hook that
/// returns one of them turns a single network read into several chunks. They
/// are never observed by stream consumers.
pub enum ChunkData {
    Null,
    Bytes(Bytes),
    Text(String),
    Json(Value),
    Iter(Box<dyn Iterator<Item = ChunkData> + Send>),
    Stream(BoxStream<'static, ChunkData>),
}

impl ChunkData {
    /// Fan out a synchronous sequence.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = ChunkData>,
        I::IntoIter: Send + 'static,
    {
        ChunkData::Iter(Box::new(items.into_iter()))
    }

    pub fn is_fan_out(&self) -> bool {
        matches!(self, ChunkData::Iter(_) | ChunkData::Stream(_))
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ChunkData::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChunkData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ChunkData::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for ChunkData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkData::Null => f.write_str("Null"),
            ChunkData::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            ChunkData::Text(s) => f.debug_tuple("Text").field(s).finish(),
            ChunkData::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ChunkData::Iter(_) => f.write_str("Iter(..)"),
            ChunkData::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl PartialEq for ChunkData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ChunkData::Null, ChunkData::Null) => true,
            (ChunkData::Bytes(a), ChunkData::Bytes(b)) => a == b,
            (ChunkData::Text(a), ChunkData::Text(b)) => a == b,
            (ChunkData::Json(a), ChunkData::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Value> for ChunkData {
    fn from(v: Value) -> Self {
        ChunkData::Json(v)
    }
}

impl From<String> for ChunkData {
    fn from(s: String) -> Self {
        ChunkData::Text(s)
    }
}

impl From<&str> for ChunkData {
    fn from(s: &str) -> Self {
        ChunkData::Text(s.to_string())
    }
}

impl From<Bytes> for ChunkData {
    fn from(b: Bytes) -> Self {
        ChunkData::Bytes(b)
    }
}

/// One chunk: the raw read it came from, its processed value, and an optional error.
#[derive(Debug)]
pub struct StreamChunk {
    pub source: Bytes,
    pub result: ChunkData,
    pub error: Option<RequestError>,
}

impl StreamChunk {
    /// Fresh chunk for a raw read; `result` starts as the raw bytes.
    pub fn new(source: Bytes) -> Self {
        Self {
            result: ChunkData::Bytes(source.clone()),
            source,
            error: None,
        }
    }

    /// Error chunk for a read whose transformation failed.
    pub fn failed(source: Bytes, error: RequestError) -> Self {
        Self {
            source,
            result: ChunkData::Null,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
