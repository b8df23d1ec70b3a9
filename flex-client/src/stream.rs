//! Bridge from an async response body to a blocking `Read`.
//!
//! Archive ingestion is synchronous and runs on a blocking thread. A task
//! on the runtime forwards body chunks through a bounded channel, so at
//! most `STREAM_CHANNEL_SIZE` chunks are buffered at any time.
//!
//! A body error reaches the reader as an `io::Error` wrapping
//! `ApiError::Transport`, so archive ingestion can report it as a transport
//! failure instead of a local one.

use bytes::{Buf, Bytes};
use flex_core::ApiError;
use futures::{Stream, StreamExt};
use std::io::{self, Read};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Chunks buffered between the network task and the reader.
pub const STREAM_CHANNEL_SIZE: usize = 16;

/// Called with `(bytes received, total bytes if known)` as a body streams in.
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Blocking reader fed by a channel of body chunks.
///
/// Must be read from outside the async runtime (e.g. `spawn_blocking`).
pub struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    current: Bytes,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while !self.current.has_remaining() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.current.remaining());
        self.current.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

/// Spawn a task forwarding the body of `endpoint` into a [`ChannelReader`].
///
/// The task stops at the first error, or when the reader is dropped.
pub fn channel_reader<S, E>(
    endpoint: &str,
    stream: S,
    total: Option<u64>,
    progress: Option<ProgressFn>,
) -> ChannelReader
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_SIZE);
    let endpoint = endpoint.to_string();
    tokio::spawn(async move {
        let mut stream = Box::pin(stream);
        let mut received = 0u64;
        while let Some(chunk) = stream.next().await {
            let item = chunk.map_err(|e| {
                tracing::debug!("Body of {} failed after {} bytes: {}", endpoint, received, e);
                io::Error::other(ApiError::Transport {
                    endpoint: endpoint.clone(),
                    message: e.to_string(),
                })
            });
            let failed = item.is_err();
            if let Ok(bytes) = &item {
                received += bytes.len() as u64;
                if let Some(progress) = &progress {
                    progress(received, total);
                }
            }
            if tx.send(item).await.is_err() {
                tracing::debug!("Archive reader dropped after {} bytes", received);
                break;
            }
            if failed {
                break;
            }
        }
    });
    ChannelReader {
        rx,
        current: Bytes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn chunks(parts: Vec<&'static str>) -> impl Stream<Item = Result<Bytes, io::Error>> + Send {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    #[tokio::test]
    async fn test_reads_all_chunks() {
        let mut reader = channel_reader("assets/pull", chunks(vec!["hel", "", "lo ", "world"]), None, None);
        let text = tokio::task::spawn_blocking(move || {
            let mut text = String::new();
            reader.read_to_string(&mut text).unwrap();
            text
        })
        .await
        .unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_small_reads_span_chunks() {
        let mut reader = channel_reader("assets/pull", chunks(vec!["abcdef", "gh"]), None, None);
        let reads = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4];
            let mut out = Vec::new();
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                out.push(String::from_utf8(buf[..n].to_vec()).unwrap());
            }
            out
        })
        .await
        .unwrap();
        assert_eq!(reads, vec!["abcd", "ef", "gh"]);
    }

    #[tokio::test]
    async fn test_stream_error_surfaces() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let mut reader = channel_reader("assets/pull", stream, None, None);
        let err = tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap_err()
        })
        .await
        .unwrap();
        let api = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<ApiError>())
            .unwrap();
        assert_eq!(api.code(), "transport-error");
        assert!(api.to_string().contains("assets/pull"));
        assert!(api.to_string().contains("reset"));
    }

    #[tokio::test]
    async fn test_progress_reports_bytes() {
        let seen = Arc::new(AtomicU64::new(0));
        let seen_cb = seen.clone();
        let progress: ProgressFn = Arc::new(move |received, total| {
            assert_eq!(total, Some(8));
            seen_cb.store(received, Ordering::SeqCst);
        });
        let mut reader = channel_reader("assets/pull", chunks(vec!["1234", "5678"]), Some(8), Some(progress));
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
        })
        .await
        .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }
}
