//! Anonymous pipes and pipe pairs.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::IpcError;

struct Buffer {
    data: VecDeque<u8>,
    capacity: usize,
    closed: bool,
}

/// A byte-stream pipe with a bounded in-flight buffer. Read blocks on empty,
/// write blocks on full; both fail with `PipeClosed` once `close` has run,
/// except reads, which first drain whatever was already buffered.
#[derive(Clone)]
pub struct Pipe {
    buffer: Arc<Mutex<Buffer>>,
    not_empty: Arc<Notify>,
    not_full: Arc<Notify>,
}

impl Pipe {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer {
                data: VecDeque::new(),
                capacity,
                closed: false,
            })),
            not_empty: Arc::new(Notify::new()),
            not_full: Arc::new(Notify::new()),
        }
    }

    pub async fn write(&self, bytes: &[u8]) -> Result<usize, IpcError> {
        for &byte in bytes {
            loop {
                let notified = {
                    let mut buf = self.buffer.lock().await;
                    if buf.closed {
                        return Err(IpcError::PipeClosed);
                    }
                    if buf.data.len() < buf.capacity {
                        buf.data.push_back(byte);
                        self.not_empty.notify_waiters();
                        break;
                    }
                    self.not_full.notified()
                };
                notified.await;
            }
        }
        Ok(bytes.len())
    }

    pub async fn read(&self, max: usize) -> Result<Vec<u8>, IpcError> {
        loop {
            let notified = {
                let mut buf = self.buffer.lock().await;
                if !buf.data.is_empty() {
                    let n = max.min(buf.data.len());
                    let out: Vec<u8> = buf.data.drain(..n).collect();
                    self.not_full.notify_waiters();
                    return Ok(out);
                }
                if buf.closed {
                    return Err(IpcError::PipeClosed);
                }
                self.not_empty.notified()
            };
            notified.await;
        }
    }

    /// Idempotent: closing a second time is a no-op, matching the spec's
    /// explicit closure-idempotency invariant.
    pub async fn close(&self) {
        let mut buf = self.buffer.lock().await;
        if buf.closed {
            return;
        }
        buf.closed = true;
        drop(buf);
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    pub async fn is_closed(&self) -> bool {
        self.buffer.lock().await.closed
    }
}

/// Pumps bytes written to one side's `write` into the other's `read` via a
/// background forwarding task. Closing either endpoint drains whatever was
/// already buffered to the peer before tearing the forwarder down and
/// signalling EOF — bytes not yet buffered at the moment of close are lost.
/// (Resolves the open question on pipe-pair close-race semantics.)
pub struct PipePair {
    pub left: Pipe,
    pub right: Pipe,
    forward_capacity: usize,
}

impl PipePair {
    pub fn new(capacity: usize) -> Self {
        Self {
            left: Pipe::new(capacity),
            right: Pipe::new(capacity),
            forward_capacity: capacity,
        }
    }

    /// Spawn the background task that forwards `left` writes to `right`
    /// reads, and vice versa is not implied: callers wanting bidirectional
    /// forwarding construct two `PipePair`s. This matches a unidirectional
    /// pipe's semantics: one side writes, the other reads.
    pub fn spawn_forwarder(self: &Arc<Self>) {
        let pair = self.clone();
        tokio::spawn(async move {
            loop {
                match pair.left.read(pair.forward_capacity).await {
                    Ok(bytes) if !bytes.is_empty() => {
                        if pair.right.write(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            // left closed (or errored): drain whatever is left, then close
            // the peer so waiting readers observe EOF.
            debug!("pipe pair forwarder exiting, closing peer");
            pair.right.close().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let pipe = Pipe::new(16);
        pipe.write(b"hello").await.unwrap();
        let out = pipe.read(16).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let pipe = Pipe::new(4);
        pipe.close().await;
        pipe.close().await;
        assert!(pipe.is_closed().await);
        assert!(matches!(pipe.read(1).await, Err(IpcError::PipeClosed)));
    }

    #[tokio::test]
    async fn read_drains_buffer_before_reporting_closed() {
        let pipe = Pipe::new(4);
        pipe.write(b"ab").await.unwrap();
        pipe.close().await;
        let out = pipe.read(4).await.unwrap();
        assert_eq!(out, b"ab");
        assert!(matches!(pipe.read(4).await, Err(IpcError::PipeClosed)));
    }

    #[tokio::test]
    async fn write_blocks_until_capacity_frees() {
        let pipe = Pipe::new(2);
        pipe.write(b"ab").await.unwrap();
        let pipe2 = pipe.clone();
        let writer = tokio::spawn(async move { pipe2.write(b"c").await });
        tokio::task::yield_now().await;
        let out = pipe.read(1).await.unwrap();
        assert_eq!(out, b"a");
        writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn pipe_pair_forwards_bytes() {
        let pair = Arc::new(PipePair::new(16));
        pair.spawn_forwarder();
        pair.left.write(b"hi").await.unwrap();
        let out = pair.right.read(16).await.unwrap();
        assert_eq!(out, b"hi");
    }
}
