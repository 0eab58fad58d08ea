//! Chunk stream → wire lines

use crate::engine::{ChunkStream, EngineError};
use bytes::Bytes;
use davia_core::WireChunk;
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Relays a graph run to the client, one `0:` line per admissible chunk.
///
/// Dropping the produced line stream cancels the run's token, which closes
/// the upstream connection.
pub struct StreamingProtocolAdapter {
    upstream: ChunkStream,
    cancel: CancellationToken,
}

impl StreamingProtocolAdapter {
    pub fn new(upstream: ChunkStream, cancel: CancellationToken) -> Self {
        Self { upstream, cancel }
    }

    pub fn into_lines(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let Self {
            mut upstream,
            cancel,
        } = self;
        let guard = cancel.drop_guard();

        async_stream::stream! {
            let mut sent = 0usize;

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        if let Some(text) = chunk.text_delta() {
                            sent += 1;
                            yield Ok(Bytes::from(WireChunk::text(text).encode()));
                        }
                    }
                    Err(EngineError::Cancelled) => break,
                    Err(e) => {
                        warn!("Run failed mid-stream: {}", e);
                        yield Ok(Bytes::from(WireChunk::error(e.to_string()).encode()));
                        break;
                    }
                }
            }

            debug!("Stream finished after {} text lines", sent);
            let _ = guard.disarm();
        }
    }
}
