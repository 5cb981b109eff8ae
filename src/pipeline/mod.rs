//! Streaming pipeline: the chunk loop, its finalization guard and the
//! built-in stream decoders.
//!
//! ```text
//! Response body → before_stream hooks → reads → transform hooks → flatten → chunks
//!                   (SsePlugin,                  (SsePlugin,
//!                    NdjsonPlugin reframe)         NdjsonPlugin fan out)
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | SSE and NDJSON decoders, shipped as plugins |
//! | `stream` | The chunk loop with fan-out flattening |
//! | `finalize` | Exactly-once `on_finally` per consumption |

pub mod decode;
pub(crate) mod finalize;
pub(crate) mod stream;

pub use decode::{NdjsonPlugin, SsePlugin};
pub use stream::ChunkStream;
