//! Transport trait abstraction for radio links.
//!
//! A transport moves opaque frames (encoded `ToRadio` / `FromRadio` records)
//! between the client and the attached device. Inbound frames and connection
//! status changes are delivered as [`TransportEvent`]s to every subscriber, so
//! the session and any number of observers see the same stream.

use async_trait::async_trait;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error from the underlying link
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport is closed
    #[error("Transport is closed")]
    Closed,

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Frame could not be sent as-is
    #[error("Framing error: {0}")]
    Framing(#[from] crate::framing::FramingError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport-specific error
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns true if the link is gone and further sends cannot succeed.
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Closed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Link status reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Link is being established
    Connecting,
    /// Link is up
    Connected,
    /// Link is down for good
    Disconnected,
}

/// Something that happened on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete inbound frame
    Frame(Vec<u8>),
    /// A status transition
    Status(ConnectionStatus),
}

/// Receiving side of a transport subscription.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Async transport trait for radio communication.
///
/// Implementations must accept concurrent `send` calls and must deliver every
/// inbound frame and status transition to every live subscriber.
///
/// # Examples
///
/// ```no_run
/// use meshlink_transport::{StreamTransport, Transport, TransportEvent};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = StreamTransport::connect_tcp("192.168.1.40:4403").await?;
/// let mut events = transport.subscribe();
///
/// transport.send(&[0x18, 0x01]).await?;
///
/// while let Some(event) = events.recv().await {
///     if let TransportEvent::Frame(bytes) = event {
///         println!("received {} bytes", bytes.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame to the device.
    ///
    /// # Errors
    /// Returns `TransportError::Closed` after `close`, or the link error.
    async fn send(&self, frame: &[u8]) -> TransportResult<()>;

    /// Subscribe to inbound frames and status transitions.
    ///
    /// A subscriber that subscribes after the transport closed receives a
    /// single `Disconnected` status and then end-of-stream.
    fn subscribe(&self) -> TransportEvents;

    /// Current link status.
    fn status(&self) -> ConnectionStatus;

    /// Close the link and release resources.
    ///
    /// After calling this method, sends return `TransportError::Closed` and
    /// subscribers observe `Disconnected`.
    async fn close(&self) -> TransportResult<()>;

    /// Check if the transport is closed.
    fn is_closed(&self) -> bool;

    /// Get transport statistics.
    fn stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Frames sent
    pub frames_sent: u64,
    /// Frames received
    pub frames_received: u64,
    /// Send errors
    pub send_errors: u64,
    /// Receive errors (including dropped malformed frames)
    pub recv_errors: u64,
}

impl TransportStats {
    /// Create new empty statistics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful send
    pub fn record_send(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.frames_sent += 1;
    }

    /// Record a successful receive
    pub fn record_recv(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.frames_received += 1;
    }

    /// Record a send error
    pub fn record_send_error(&mut self) {
        self.send_errors += 1;
    }

    /// Record a receive error
    pub fn record_recv_error(&mut self) {
        self.recv_errors += 1;
    }
}

/// Lock-free counters behind [`TransportStats`], shared between a transport
/// and its reader task.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    send_errors: AtomicU64,
    recv_errors: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_send(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recv(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TransportStats {
        TransportStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }
}

/// Subscriber fan-out plus the current status.
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Debug)]
pub(crate) struct EventHub {
    inner: Mutex<HubState>,
}

#[derive(Debug)]
struct HubState {
    status: ConnectionStatus,
    subscribers: Vec<mpsc::UnboundedSender<TransportEvent>>,
}

impl EventHub {
    pub(crate) fn new(status: ConnectionStatus) -> Self {
        Self {
            inner: Mutex::new(HubState {
                status,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        // A panicking subscriber cannot leave the list half-updated
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn subscribe(&self) -> TransportEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if state.status == ConnectionStatus::Disconnected {
            let _ = tx.send(TransportEvent::Status(ConnectionStatus::Disconnected));
            return rx;
        }
        state.subscribers.push(tx);
        rx
    }

    pub(crate) fn status(&self) -> ConnectionStatus {
        self.lock().status
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Publish an inbound frame. Returns how many subscribers received it.
    pub(crate) fn publish_frame(&self, frame: &[u8]) -> usize {
        let mut state = self.lock();
        if state.status == ConnectionStatus::Disconnected {
            return 0;
        }
        state
            .subscribers
            .retain(|tx| tx.send(TransportEvent::Frame(frame.to_vec())).is_ok());
        state.subscribers.len()
    }

    /// Move to `status`. Returns false when the transition was a no-op or the
    /// hub is already disconnected.
    pub(crate) fn set_status(&self, status: ConnectionStatus) -> bool {
        let mut state = self.lock();
        if state.status == status || state.status == ConnectionStatus::Disconnected {
            return false;
        }
        state.status = status;
        state
            .subscribers
            .retain(|tx| tx.send(TransportEvent::Status(status)).is_ok());
        if status == ConnectionStatus::Disconnected {
            // Dropping the senders ends every subscription
            state.subscribers.clear();
        }
        true
    }
}
