//! Client session state — one connected client's identity and buffered
//! writer.
//!
//! A session owns the socket's write half and a fixed-capacity accumulation
//! buffer behind a single async lock. Outbound bytes are queued into the
//! buffer and flushed on demand; when an append would exceed the capacity,
//! the buffer is flushed first, so it never grows. Sessions are created on
//! accept, removed on disconnect, and never reused.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use crosspoint_core::ConnectionId;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

/// Write-side state guarded by the session's lock.
struct WriteState {
    writer: OwnedWriteHalf,
    pending: BytesMut,
}

/// Represents one connected client.
pub struct ClientSession {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Remote peer address.
    pub peer: SocketAddr,
    /// When this connection was established.
    connected_at: Instant,
    /// Accumulation-buffer capacity; appends beyond it flush first.
    capacity: usize,
    /// Total bytes flushed to the socket.
    bytes_sent: AtomicU64,
    write: Mutex<WriteState>,
}

impl ClientSession {
    /// Create a session around a connected socket's write half.
    pub fn new(
        id: ConnectionId,
        peer: SocketAddr,
        writer: OwnedWriteHalf,
        capacity: usize,
    ) -> Self {
        Self {
            id,
            peer,
            connected_at: Instant::now(),
            capacity,
            bytes_sent: AtomicU64::new(0),
            write: Mutex::new(WriteState {
                writer,
                pending: BytesMut::with_capacity(capacity),
            }),
        }
    }

    /// Queue bytes into the accumulation buffer without writing them out.
    ///
    /// If the append would exceed the buffer capacity, the pending bytes
    /// are flushed first. A frame larger than the whole capacity is written
    /// through directly and never parked in the buffer.
    pub async fn queue(&self, data: &[u8]) -> io::Result<()> {
        let mut state = self.write.lock().await;
        self.queue_locked(&mut state, data).await
    }

    /// Write the pending bytes to the socket and clear the buffer.
    pub async fn flush(&self) -> io::Result<()> {
        let mut state = self.write.lock().await;
        self.flush_locked(&mut state).await
    }

    /// Queue and immediately flush ("send now" semantics).
    pub async fn send_now(&self, data: &[u8]) -> io::Result<()> {
        let mut state = self.write.lock().await;
        self.queue_locked(&mut state, data).await?;
        self.flush_locked(&mut state).await
    }

    async fn queue_locked(&self, state: &mut WriteState, data: &[u8]) -> io::Result<()> {
        if state.pending.len() + data.len() > self.capacity {
            self.flush_locked(state).await?;
        }
        if data.len() > self.capacity {
            state.writer.write_all(data).await?;
            state.writer.flush().await?;
            let _ = self
                .bytes_sent
                .fetch_add(data.len() as u64, Ordering::Relaxed);
        } else {
            state.pending.extend_from_slice(data);
        }
        Ok(())
    }

    async fn flush_locked(&self, state: &mut WriteState) -> io::Result<()> {
        if state.pending.is_empty() {
            return Ok(());
        }
        state.writer.write_all(&state.pending).await?;
        state.writer.flush().await?;
        let _ = self
            .bytes_sent
            .fetch_add(state.pending.len() as u64, Ordering::Relaxed);
        state.pending.clear();
        Ok(())
    }

    /// Bytes currently queued and not yet flushed.
    pub async fn pending_len(&self) -> usize {
        self.write.lock().await.pending.len()
    }

    /// Total bytes flushed to the socket over the session's lifetime.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// How long this session has been connected.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Best-effort shutdown of the write side on teardown.
    pub async fn shutdown(&self) {
        let mut state = self.write.lock().await;
        let _ = state.writer.shutdown().await;
    }
}
