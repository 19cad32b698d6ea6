//! Framed byte-stream transport (TCP, serial bridges, pipes).

use crate::framing::{StreamFramer, encode_frame};
use crate::transport::{
    ConnectionStatus, EventHub, StatsCounters, Transport, TransportError, TransportEvents,
    TransportResult, TransportStats,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// TCP port devices listen on for stream clients.
pub const DEFAULT_TCP_PORT: u16 = 4403;

const READ_BUF_SIZE: usize = 1024;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Transport over any framed byte stream.
///
/// A reader task owns the read half: it reassembles frames and publishes them
/// to subscribers. End-of-stream or a read error moves the transport to
/// `Disconnected`. Writes are serialized behind an async mutex so concurrent
/// senders never interleave frame bytes.
pub struct StreamTransport {
    writer: Mutex<BoxedWriter>,
    hub: Arc<EventHub>,
    stats: Arc<StatsCounters>,
    closed: Arc<AtomicBool>,
    reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl StreamTransport {
    /// Wrap an already-open stream. Must be called inside a Tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let hub = Arc::new(EventHub::new(ConnectionStatus::Connected));
        let stats = Arc::new(StatsCounters::default());
        let closed = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(read_loop(
            reader,
            Arc::clone(&hub),
            Arc::clone(&stats),
            Arc::clone(&closed),
        ));

        Self {
            writer: Mutex::new(Box::new(writer)),
            hub,
            stats,
            closed,
            reader: std::sync::Mutex::new(Some(handle)),
        }
    }

    /// Connect to a device's TCP API.
    ///
    /// # Errors
    /// Returns `TransportError::ConnectionFailed` if the connection cannot be
    /// established.
    pub async fn connect_tcp<A: ToSocketAddrs>(addr: A) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        stream.set_nodelay(true)?;
        if let Ok(peer) = stream.peer_addr() {
            tracing::info!("Connected to device at {}", peer);
        }
        let (read, write) = stream.into_split();
        Ok(Self::new(read, write))
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
        self.hub.set_status(ConnectionStatus::Disconnected);
    }
}

async fn read_loop<R>(
    mut reader: R,
    hub: Arc<EventHub>,
    stats: Arc<StatsCounters>,
    closed: Arc<AtomicBool>,
) where
    R: AsyncRead + Send + Unpin,
{
    let mut framer = StreamFramer::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    let mut invalid_seen = 0;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::info!("Stream closed by device");
                break;
            }
            Ok(n) => {
                framer.push(&buf[..n]);
                while let Some(frame) = framer.next_frame() {
                    stats.record_recv(frame.len());
                    tracing::trace!("Received {} byte frame", frame.len());
                    hub.publish_frame(&frame);
                }
                while invalid_seen < framer.invalid_headers() {
                    invalid_seen += 1;
                    stats.record_recv_error();
                    tracing::warn!("Dropped frame header with out-of-range length");
                }
            }
            Err(e) => {
                stats.record_recv_error();
                tracing::warn!("Stream read failed: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    hub.set_status(ConnectionStatus::Disconnected);
}

#[async_trait]
impl Transport for StreamTransport {
    async fn send(&self, frame: &[u8]) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let bytes = match encode_frame(frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_send_error();
                return Err(e.into());
            }
        };

        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;

        match result {
            Ok(()) => {
                self.stats.record_send(frame.len());
                tracing::trace!("Sent {} byte frame", frame.len());
                Ok(())
            }
            Err(e) => {
                self.stats.record_send_error();
                let err = TransportError::Io(e);
                if err.is_closed() {
                    drop(writer);
                    self.mark_closed();
                }
                Err(err)
            }
        }
    }

    fn subscribe(&self) -> TransportEvents {
        self.hub.subscribe()
    }

    fn status(&self) -> ConnectionStatus {
        self.hub.status()
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            self.hub.set_status(ConnectionStatus::Disconnected);
            return Ok(());
        }
        let shutdown = self.writer.lock().await.shutdown().await;
        self.mark_closed();
        if let Err(e) = shutdown {
            tracing::debug!("Stream shutdown error: {}", e);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}
