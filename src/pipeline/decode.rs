//! Streaming decoders as plugins.
//!
//! Each decoder contributes two hooks: `before_stream` re-frames the body so
//! every read holds whole frames, and `transform_stream_chunk` fans a read
//! out into one chunk per frame.

use crate::plugins::{HookType, Plugin, PluginPriority};
use crate::transport::ByteStream;
use crate::types::{ChunkData, RequestConfig, StreamChunk};
use crate::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

/// Re-chunk `input` so every emitted read ends on `delimiter` (the trailing
/// remainder at EOF is emitted as-is).
fn reframe(input: ByteStream, delimiter: Bytes) -> ByteStream {
    let s = stream::unfold(
        (input, BytesMut::new(), false),
        move |(mut input, mut buf, finished)| {
            let delimiter = delimiter.clone();
            async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some(end) = last_boundary(&buf, &delimiter) {
                        let frames = buf.split_to(end).freeze();
                        return Some((Ok(frames), (input, buf, false)));
                    }

                    match input.next().await {
                        Some(Ok(bytes)) => {
                            buf.extend_from_slice(&bytes);
                            continue;
                        }
                        Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                        None => {
                            if buf.is_empty() {
                                return None;
                            }
                            let rest = buf.split().freeze();
                            return Some((Ok(rest), (input, buf, true)));
                        }
                    }
                }
            }
        },
    );
    Box::pin(s)
}

/// Byte offset just past the last complete `delimiter` in `buf`.
fn last_boundary(buf: &[u8], delimiter: &[u8]) -> Option<usize> {
    if delimiter.is_empty() || buf.len() < delimiter.len() {
        return None;
    }
    buf.windows(delimiter.len())
        .rposition(|w| w == delimiter)
        .map(|i| i + delimiter.len())
}

fn chunk_bytes(chunk: &StreamChunk) -> Bytes {
    match &chunk.result {
        ChunkData::Bytes(b) => b.clone(),
        ChunkData::Text(s) => Bytes::from(s.clone()),
        _ => chunk.source.clone(),
    }
}

fn json_or_text(payload: &str, json: bool) -> ChunkData {
    if json {
        if let Ok(v) = serde_json::from_str::<Value>(payload) {
            return ChunkData::Json(v);
        }
    }
    ChunkData::Text(payload.to_string())
}

/// Server-sent events decoder.
///
/// Frames are separated by a blank line; `data:` lines of one frame are
/// joined with `\n`. Comment frames (leading `:`) and the done signal are
/// dropped. Payloads that parse as JSON become [`ChunkData::Json`].
#[derive(Debug, Clone)]
pub struct SsePlugin {
    delimiter: String,
    prefix: String,
    done_signal: String,
    json: bool,
    priority: i32,
}

impl SsePlugin {
    pub fn new() -> Self {
        Self {
            delimiter: "\n\n".to_string(),
            prefix: "data:".to_string(),
            done_signal: "[DONE]".to_string(),
            json: true,
            priority: PluginPriority::High.into(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_done_signal(mut self, done_signal: impl Into<String>) -> Self {
        self.done_signal = done_signal.into();
        self
    }

    /// Keep payloads as text instead of parsing JSON.
    pub fn text_only(mut self) -> Self {
        self.json = false;
        self
    }

    pub fn with_priority(mut self, priority: impl Into<i32>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn into_plugin(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }

    fn frame_payload(&self, frame: &str) -> Option<String> {
        let mut data: Vec<&str> = Vec::new();
        for line in frame.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix(&self.prefix) {
                data.push(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }
        if data.is_empty() {
            return None;
        }
        let payload = data.join("\n");
        if payload.trim() == self.done_signal {
            return None;
        }
        Some(payload)
    }

    /// Decode every complete frame in `raw`.
    pub fn decode_frames(&self, raw: &str) -> Vec<ChunkData> {
        let normalized = raw.replace("\r\n", "\n");
        normalized
            .split(self.delimiter.as_str())
            .filter_map(|frame| self.frame_payload(frame))
            .map(|payload| json_or_text(&payload, self.json))
            .collect()
    }
}

impl Default for SsePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for SsePlugin {
    fn name(&self) -> &str {
        "sse"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn implements(&self, hook: HookType) -> bool {
        matches!(hook, HookType::BeforeStream | HookType::TransformStreamChunk)
    }

    async fn before_stream(&self, body: ByteStream, _config: &RequestConfig) -> Result<ByteStream> {
        Ok(reframe(body, Bytes::from(self.delimiter.clone())))
    }

    async fn transform_stream_chunk(
        &self,
        mut chunk: StreamChunk,
        _config: &RequestConfig,
    ) -> Result<StreamChunk> {
        let raw = chunk_bytes(&chunk);
        let frames = self.decode_frames(&String::from_utf8_lossy(&raw));
        chunk.result = ChunkData::iter(frames);
        Ok(chunk)
    }
}

/// Newline-delimited JSON decoder: one chunk per non-empty line.
#[derive(Debug, Clone)]
pub struct NdjsonPlugin {
    priority: i32,
}

impl NdjsonPlugin {
    pub fn new() -> Self {
        Self {
            priority: PluginPriority::High.into(),
        }
    }

    pub fn with_priority(mut self, priority: impl Into<i32>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn into_plugin(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

impl Default for NdjsonPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for NdjsonPlugin {
    fn name(&self) -> &str {
        "ndjson"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn implements(&self, hook: HookType) -> bool {
        matches!(hook, HookType::BeforeStream | HookType::TransformStreamChunk)
    }

    async fn before_stream(&self, body: ByteStream, _config: &RequestConfig) -> Result<ByteStream> {
        Ok(reframe(body, Bytes::from_static(b"\n")))
    }

    async fn transform_stream_chunk(
        &self,
        mut chunk: StreamChunk,
        _config: &RequestConfig,
    ) -> Result<StreamChunk> {
        let raw = chunk_bytes(&chunk);
        let mut values = Vec::new();
        for line in String::from_utf8_lossy(&raw).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            values.push(ChunkData::Json(serde_json::from_str::<Value>(line)?));
        }
        chunk.result = ChunkData::iter(values);
        Ok(chunk)
    }
}
