//! The chunk loop behind `Request::stream`.
//!
//! ```text
//! body ─▶ before_stream* ─▶ read (raced with abort) ─▶ transform_stream_chunk* ─▶ flatten ─▶ consumer
//! ```
//!
//! A transform hook may return [`ChunkData::Iter`] or [`ChunkData::Stream`];
//! those are drained depth-first into separate chunks that all carry the raw
//! read they came from. A failing hook costs one error chunk, a failing read
//! ends the stream.

use crate::client::error_classification::ErrorHandler;
use crate::error::{ErrorOrigin, RequestError};
use crate::pipeline::finalize::FinalizeGuard;
use crate::plugins::Plugin;
use crate::transport::{AbortSignal, ByteStream};
use crate::types::{ChunkData, RequestConfig, StreamChunk};
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Stream of chunks handed to consumers. Per-read failures arrive as chunks
/// with `error` set; an `Err` item is a reader-level failure and is the last item.
pub type ChunkStream = Pin<Box<dyn Stream<Item = std::result::Result<StreamChunk, RequestError>> + Send>>;

enum FanOut {
    Iter(Box<dyn Iterator<Item = ChunkData> + Send>),
    Stream(BoxStream<'static, ChunkData>),
}

impl FanOut {
    fn from_data(data: ChunkData) -> std::result::Result<FanOut, ChunkData> {
        match data {
            ChunkData::Iter(it) => Ok(FanOut::Iter(it)),
            ChunkData::Stream(s) => Ok(FanOut::Stream(s)),
            other => Err(other),
        }
    }
}

/// Run `body` through every `before_stream` hook in order.
pub(crate) async fn apply_before_stream(
    hooks: &[Arc<dyn Plugin>],
    mut body: ByteStream,
    config: &RequestConfig,
) -> Result<ByteStream> {
    for plugin in hooks {
        body = plugin.before_stream(body, config).await?;
    }
    Ok(body)
}

async fn apply_transforms(
    hooks: &[Arc<dyn Plugin>],
    mut chunk: StreamChunk,
    config: &RequestConfig,
) -> Result<StreamChunk> {
    for plugin in hooks {
        chunk = plugin.transform_stream_chunk(chunk, config).await?;
    }
    Ok(chunk)
}

async fn next_or_abort<S>(stream: &mut S, signal: &AbortSignal) -> Option<Result<S::Item>>
where
    S: Stream + Unpin,
{
    tokio::select! {
        biased;
        _ = signal.cancelled() => Some(Err(Error::Cancelled)),
        item = stream.next() => item.map(Ok),
    }
}

/// Everything the chunk loop needs besides the body.
pub(crate) struct ChunkPipeline {
    pub(crate) transform: Vec<Arc<dyn Plugin>>,
    pub(crate) config: Arc<RequestConfig>,
    pub(crate) signal: AbortSignal,
    pub(crate) errors: ErrorHandler,
}

impl ChunkPipeline {
    /// Drive `body` to completion. `guard` finalizes when the loop ends or
    /// the returned stream is dropped.
    pub(crate) fn run(self, body: ByteStream, guard: FinalizeGuard) -> ChunkStream {
        let ChunkPipeline {
            transform,
            config,
            signal,
            errors,
        } = self;

        Box::pin(async_stream::stream! {
            let mut body = body;
            'read: loop {
                let source: Bytes = match next_or_abort(&mut body, &signal).await {
                    None => break 'read,
                    Some(Ok(Ok(bytes))) => bytes,
                    Some(Ok(Err(e))) | Some(Err(e)) => {
                        let err = errors
                            .handle_with_origin(e, Some(ErrorOrigin::Stream), &config)
                            .await;
                        tracing::debug!(error_kind = %err.kind, "stream read failed");
                        yield Err(err);
                        break 'read;
                    }
                };

                let chunk = match apply_transforms(&transform, StreamChunk::new(source.clone()), &config).await {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let err = errors
                            .handle_with_origin(e, Some(ErrorOrigin::Plugin), &config)
                            .await;
                        yield Ok(StreamChunk::failed(source, err));
                        continue 'read;
                    }
                };

                let StreamChunk { source, result, error } = chunk;
                let mut stack = match FanOut::from_data(result) {
                    Ok(fan_out) => vec![fan_out],
                    Err(single) => {
                        yield Ok(StreamChunk { source, result: single, error });
                        continue 'read;
                    }
                };

                loop {
                    let item = match stack.last_mut() {
                        None => break,
                        Some(FanOut::Iter(it)) => it.next().map(Ok),
                        Some(FanOut::Stream(s)) => match next_or_abort(s, &signal).await {
                            None => None,
                            Some(Ok(item)) => Some(item),
                            Some(Err(e)) => {
                                let err = errors.handle(e, &config).await;
                                yield Err(err);
                                break 'read;
                            }
                        },
                    };
                    match item {
                        None => {
                            stack.pop();
                        }
                        Some(Ok(data)) => match FanOut::from_data(data) {
                            Ok(nested) => stack.push(nested),
                            Err(value) => {
                                yield Ok(StreamChunk {
                                    source: source.clone(),
                                    result: value,
                                    error: error.clone(),
                                });
                            }
                        },
                        Some(Err(e)) => {
                            let err = errors
                                .handle_with_origin(e, Some(ErrorOrigin::Plugin), &config)
                                .await;
                            yield Ok(StreamChunk::failed(source.clone(), err));
                        }
                    }
                }
            }
            guard.finish().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::finalize::Finalizer;
    use crate::plugins::{FinallyContext, FnPlugin};
    use crate::transport::AbortController;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn body(parts: Vec<&'static str>) -> ByteStream {
        Box::pin(futures::stream::iter(
            parts.into_iter().map(|p| Ok(Bytes::from(p))),
        ))
    }

    fn pipeline(
        transform: Vec<Arc<dyn Plugin>>,
        controller: &AbortController,
    ) -> (ChunkPipeline, FinalizeGuard, Arc<AtomicUsize>) {
        let finals = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&finals);
        let config = Arc::new(RequestConfig::new("/s"));
        let finalizer = Finalizer::new(
            vec![FnPlugin::new("fin")
                .on_finally(move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                })
                .build()],
            FinallyContext {
                config: Arc::clone(&config),
            },
        );
        let p = ChunkPipeline {
            transform,
            config,
            signal: controller.signal(),
            errors: ErrorHandler::new(Vec::new(), Arc::new(AtomicBool::new(false))),
        };
        (p, FinalizeGuard::new(finalizer), finals)
    }

    #[tokio::test]
    async fn passthrough_yields_raw_reads() {
        let controller = AbortController::new();
        let (p, guard, finals) = pipeline(Vec::new(), &controller);
        let chunks: Vec<_> = p.run(body(vec!["a", "b"]), guard).collect().await;
        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().unwrap();
        assert_eq!(first.result, ChunkData::Bytes(Bytes::from("a")));
        assert_eq!(first.source, Bytes::from("a"));
        assert_eq!(finals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn iterator_results_are_flattened() {
        let split = FnPlugin::new("split")
            .transform_stream_chunk(|mut chunk, _| {
                chunk.result = ChunkData::iter(vec![
                    ChunkData::Json(json!(1)),
                    ChunkData::Json(json!(2)),
                    ChunkData::Json(json!(3)),
                ]);
                Ok(chunk)
            })
            .build();
        let controller = AbortController::new();
        let (p, guard, _) = pipeline(vec![split], &controller);
        let chunks: Vec<_> = p
            .run(body(vec!["raw"]), guard)
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.source, Bytes::from("raw"));
            assert_eq!(chunk.result, ChunkData::Json(json!(i + 1)));
        }
    }

    #[tokio::test]
    async fn nested_streams_flatten_depth_first() {
        let nest = FnPlugin::new("nest")
            .transform_stream_chunk(|mut chunk, _| {
                let inner: BoxStream<'static, ChunkData> = Box::pin(futures::stream::iter(vec![
                    Ok(ChunkData::from("b")),
                    Ok(ChunkData::iter(vec![ChunkData::from("c"), ChunkData::from("d")])),
                ]));
                chunk.result = ChunkData::iter(vec![
                    ChunkData::from("a"),
                    ChunkData::Stream(inner),
                    ChunkData::from("e"),
                ]);
                Ok(chunk)
            })
            .build();
        let controller = AbortController::new();
        let (p, guard, _) = pipeline(vec![nest], &controller);
        let texts: Vec<String> = p
            .run(body(vec!["x"]), guard)
            .map(|c| c.unwrap().result.as_text().unwrap_or_default().to_string())
            .collect()
            .await;
        assert_eq!(texts, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn hook_failure_is_one_error_chunk() {
        let picky = FnPlugin::new("picky")
            .transform_stream_chunk(|chunk, _| {
                if chunk.source == Bytes::from("bad") {
                    Err(Error::plugin("picky", "cannot parse"))
                } else {
                    Ok(chunk)
                }
            })
            .build();
        let controller = AbortController::new();
        let (p, guard, finals) = pipeline(vec![picky], &controller);
        let chunks: Vec<_> = p
            .run(body(vec!["ok", "bad", "ok"]), guard)
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks[1].is_error());
        assert_eq!(chunks[1].result, ChunkData::Null);
        assert_eq!(chunks[1].error.as_ref().unwrap().origin, ErrorOrigin::Plugin);
        assert!(!chunks[2].is_error());
        assert_eq!(finals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reader_failure_ends_the_stream() {
        let failing: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from("a")),
            Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "reset"))),
            Ok(Bytes::from("never")),
        ]));
        let controller = AbortController::new();
        let (p, guard, finals) = pipeline(Vec::new(), &controller);
        let items: Vec<_> = p.run(failing, guard).collect().await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.origin, ErrorOrigin::Stream);
        assert_eq!(finals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abort_interrupts_a_pending_read() {
        let controller = AbortController::new();
        let (p, guard, _) = pipeline(Vec::new(), &controller);
        let pending: ByteStream = Box::pin(futures::stream::pending());
        let mut stream = p.run(pending, guard);
        controller.abort();
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.name, "Aborted");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn early_drop_still_finalizes_once() {
        let controller = AbortController::new();
        let (p, guard, finals) = pipeline(Vec::new(), &controller);
        let mut stream = p.run(body(vec!["a", "b", "c"]), guard);
        assert!(stream.next().await.is_some());
        drop(stream);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(finals.load(Ordering::SeqCst), 1);
    }
}
