//! In-process transport for tests and simulations.
//!
//! [`MemoryTransport::pair`] returns the client side (a [`Transport`]) and a
//! [`RadioHandle`] that plays the device: it observes outbound frames, injects
//! inbound frames and status changes, and can make sends fail.

use crate::transport::{
    ConnectionStatus, EventHub, StatsCounters, Transport, TransportError, TransportEvents,
    TransportResult, TransportStats,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

struct Shared {
    hub: EventHub,
    stats: StatsCounters,
    closed: AtomicBool,
    failing_sends: AtomicUsize,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// Client side of an in-memory link.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Device side of an in-memory link.
#[derive(Clone)]
pub struct RadioHandle {
    shared: Arc<Shared>,
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl MemoryTransport {
    /// A connected link.
    pub fn pair() -> (Self, RadioHandle) {
        Self::with_status(ConnectionStatus::Connected)
    }

    /// A link that starts in `Connecting`; the radio decides when it is up.
    pub fn connecting() -> (Self, RadioHandle) {
        Self::with_status(ConnectionStatus::Connecting)
    }

    fn with_status(status: ConnectionStatus) -> (Self, RadioHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            hub: EventHub::new(status),
            stats: StatsCounters::default(),
            closed: AtomicBool::new(false),
            failing_sends: AtomicUsize::new(0),
            outbound: tx,
        });
        let radio = RadioHandle {
            shared: Arc::clone(&shared),
            outbound: Arc::new(Mutex::new(rx)),
        };
        (Self { shared }, radio)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: &[u8]) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let fail = self
            .shared
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            self.shared.stats.record_send_error();
            return Err(TransportError::Other("injected send failure".to_string()));
        }
        self.shared
            .outbound
            .send(frame.to_vec())
            .map_err(|_| TransportError::Closed)?;
        self.shared.stats.record_send(frame.len());
        Ok(())
    }

    fn subscribe(&self) -> TransportEvents {
        self.shared.hub.subscribe()
    }

    fn status(&self) -> ConnectionStatus {
        self.shared.hub.status()
    }

    async fn close(&self) -> TransportResult<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.hub.set_status(ConnectionStatus::Disconnected);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn stats(&self) -> TransportStats {
        self.shared.stats.snapshot()
    }
}

impl RadioHandle {
    /// Deliver a frame to every client subscriber. Returns the subscriber
    /// count it reached.
    pub fn inject_frame(&self, frame: impl AsRef<[u8]>) -> usize {
        let frame = frame.as_ref();
        self.shared.stats.record_recv(frame.len());
        self.shared.hub.publish_frame(frame)
    }

    /// Report a status transition to the client.
    pub fn set_status(&self, status: ConnectionStatus) {
        if status == ConnectionStatus::Disconnected {
            self.shared.closed.store(true, Ordering::SeqCst);
        }
        self.shared.hub.set_status(status);
    }

    /// Drop the link from the device side.
    pub fn disconnect(&self) {
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Make the next `n` sends fail.
    pub fn fail_next_sends(&self, n: usize) {
        self.shared.failing_sends.store(n, Ordering::SeqCst);
    }

    /// Wait for the next frame the client sent.
    pub async fn next_sent(&self) -> Option<Vec<u8>> {
        self.outbound.lock().await.recv().await
    }

    /// Next frame the client sent, if one is already queued.
    pub fn try_next_sent(&self) -> Option<Vec<u8>> {
        self.outbound.try_lock().ok()?.try_recv().ok()
    }

    /// Number of live client subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.hub.subscriber_count()
    }

    /// Whether the client closed the link.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}
