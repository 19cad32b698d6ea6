//! Session - the connection to one attached device
//!
//! A `Session` owns the transport and every piece of per-connection state:
//! the dispatcher, the response correlator, the ack tracker and the node
//! directory. Request builders in [`crate::api`] are thin callers of
//! [`Session::request`] and [`Session::send_packet`].
//!
//! # Example
//!
//! ```no_run
//! use meshlink_core::{Session, SessionConfig};
//! use meshlink_transport::StreamTransport;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = StreamTransport::connect_tcp("192.168.1.20:4403").await?;
//! let session = Session::new(Arc::new(transport), SessionConfig::default());
//! session.start().await?;
//! session.configure().await?;
//!
//! let owner = session.admin().get_owner(0x1234_abcd).await?;
//! println!("{}", owner.long_name);
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Lifecycle
//!
//! ```text
//!   Disconnected ──start()──▶ Connecting ──transport up──▶ Connected
//!                                  │                           │
//!                                  └──────────┬────────────────┘
//!                                             ▼
//!                           Disconnected (terminal, waiters rejected)
//! ```

use crate::ack::AckTracker;
use crate::config::SessionConfig;
use crate::correlator::{Correlator, ResponseKind};
use crate::directory::Directory;
use crate::dispatcher::{Dispatcher, SubscriptionId};
use crate::envelope::{Category, DeviceStatus, InboundEnvelope};
use crate::error::{RequestError, Result};
use crate::packet_id::{CorrelationId, PacketIdGenerator};
use crate::routing::ack_info;
use meshlink_proto::{
    BROADCAST_ADDR, CodecError, Data, MAX_DATA_PAYLOAD, MeshPacket, MessageKind, PKC_CHANNEL_INDEX,
    PortNum, ToRadio, encode_bounded, mesh_packet,
};
use meshlink_transport::{
    ConnectionStatus, MAX_FRAME_PAYLOAD, Transport, TransportEvent, TransportEvents,
};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// How often overdue waiters are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Session connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not started, or closed for good
    Disconnected,
    /// Started, waiting for the transport
    Connecting,
    /// Transport is up
    Connected,
}

impl SessionState {
    /// Whether moving from `self` to `next` is allowed
    pub const fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Disconnected, SessionState::Connecting)
                | (SessionState::Connecting, SessionState::Connected)
                | (SessionState::Connecting, SessionState::Disconnected)
                | (SessionState::Connected, SessionState::Disconnected)
        )
    }
}

/// A packet to originate
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundPacket {
    /// Destination node number
    pub to: u32,
    /// Application port
    pub port: PortNum,
    /// Encoded application payload
    pub payload: Vec<u8>,
    /// Channel index
    pub channel: u32,
    /// Ask the mesh for a delivery ack
    pub want_ack: bool,
    /// Ask the destination for an application reply
    pub want_response: bool,
    /// Name used in logs and timeout errors
    pub operation: Cow<'static, str>,
}

impl OutboundPacket {
    /// A packet to `to` on channel 0 with no flags set
    pub fn new(to: u32, port: PortNum, payload: Vec<u8>) -> Self {
        Self {
            to,
            port,
            payload,
            channel: 0,
            want_ack: false,
            want_response: false,
            operation: Cow::Borrowed("request"),
        }
    }

    /// Send on `channel`
    #[must_use]
    pub fn on_channel(mut self, channel: u32) -> Self {
        self.channel = channel;
        self
    }

    /// Request a delivery ack
    #[must_use]
    pub fn want_ack(mut self) -> Self {
        self.want_ack = true;
        self
    }

    /// Request an application reply
    #[must_use]
    pub fn want_response(mut self) -> Self {
        self.want_response = true;
        self
    }

    /// Name the operation
    #[must_use]
    pub fn named(mut self, operation: impl Into<Cow<'static, str>>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Whether this packet goes to every node
    pub fn is_broadcast(&self) -> bool {
        self.to == BROADCAST_ADDR
    }
}

/// Session inner state
pub(crate) struct SessionInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: SessionConfig,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) acks: Arc<AckTracker>,
    pub(crate) directory: Arc<Directory>,
    ids: PacketIdGenerator,
    state: watch::Sender<SessionState>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

/// Connection to one attached device.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Construction and lifecycle
// ═══════════════════════════════════════════════════════════════════════════

impl Session {
    /// Create a session over `transport`. Nothing happens until [`start`](Self::start).
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let inner = SessionInner {
            transport,
            correlator: Arc::new(Correlator::new()),
            acks: Arc::new(AckTracker::new(config.ack_log_capacity)),
            directory: Arc::new(Directory::new(config.message_log_capacity)),
            dispatcher: Dispatcher::new(),
            ids: PacketIdGenerator::new(),
            state,
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Start the session and wait for the transport to come up.
    ///
    /// # Errors
    /// `InvalidState` when called twice, `Disconnected` if the transport is
    /// already down, `Timeout` if it does not connect within
    /// `connect_timeout` (the session is then disconnected).
    pub async fn start(&self) -> Result<()> {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RequestError::invalid_state("session already started"));
        }

        self.inner.set_state(SessionState::Connecting);
        self.wire_subscribers();

        // Subscribe before reading the status so no transition is missed
        let events = self.inner.transport.subscribe();
        let status = self.inner.transport.status();

        let weak = Arc::downgrade(&self.inner);
        let correlator = Arc::clone(&self.inner.correlator);
        let dispatch = tokio::spawn(dispatch_loop(weak, correlator, events));
        self.inner.track(dispatch);

        if let Some(interval) = self.inner.config.heartbeat_interval {
            let weak = Arc::downgrade(&self.inner);
            self.inner.track(tokio::spawn(heartbeat_loop(weak, interval)));
        }

        match status {
            ConnectionStatus::Connected => {
                self.inner.set_state(SessionState::Connected);
            }
            ConnectionStatus::Disconnected => {
                self.inner.shut_down("transport already closed");
                return Err(RequestError::Disconnected);
            }
            ConnectionStatus::Connecting => {}
        }

        let mut state = self.watch_state();
        let connected = tokio::time::timeout(
            self.inner.config.connect_timeout,
            state.wait_for(|s| *s != SessionState::Connecting),
        )
        .await;

        match connected {
            Ok(Ok(s)) if *s == SessionState::Connected => {
                tracing::info!("Session connected");
                Ok(())
            }
            Ok(_) => Err(RequestError::Disconnected),
            Err(_) => {
                self.inner.shut_down("connect timeout");
                Err(RequestError::timeout("connect"))
            }
        }
    }

    /// Request the device's config dump and wait until it is complete.
    ///
    /// Node, channel and metadata records in the dump land in the
    /// [`Directory`] as they arrive.
    ///
    /// # Errors
    /// `Timeout` after `configure_timeout`, `Disconnected` on connection loss.
    pub async fn configure(&self) -> Result<()> {
        self.ensure_connected()?;

        let nonce = self.inner.ids.next(|_| false);
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let subscription = self
            .inner
            .dispatcher
            .subscribe(Category::ConfigComplete, move |envelope| {
                if let InboundEnvelope::ConfigComplete(id) = envelope {
                    if *id == nonce {
                        if let Some(tx) = slot.lock().unwrap_or_else(|e| e.into_inner()).take() {
                            let _ = tx.send(());
                        }
                    }
                }
            });

        tracing::debug!("Requesting config dump {}", nonce);
        let result = async {
            self.send_record(&ToRadio::want_config(nonce)).await?;
            let mut state = self.watch_state();
            tokio::select! {
                done = tokio::time::timeout(self.inner.config.configure_timeout, rx) => match done {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => Err(RequestError::Disconnected),
                    Err(_) => Err(RequestError::timeout("configure")),
                },
                _ = state.wait_for(|s| *s == SessionState::Disconnected) => {
                    Err(RequestError::Disconnected)
                }
            }
        }
        .await;
        self.inner.dispatcher.unsubscribe(subscription);

        if result.is_ok() {
            tracing::info!(
                "Config complete: node {:08x}, {} nodes, {} channels",
                self.inner.directory.my_node_num(),
                self.inner.directory.nodes().len(),
                self.inner.directory.channels().len()
            );
        }
        result
    }

    /// Close the session for good.
    ///
    /// Every outstanding request is rejected with `Disconnected`. The device
    /// is told we are leaving when the link is still up.
    pub async fn disconnect(&self) {
        if self.state() == SessionState::Connected {
            if let Err(e) = self.send_record(&ToRadio::disconnect()).await {
                tracing::debug!("Disconnect notice not sent: {}", e);
            }
        }
        self.inner.shut_down("disconnect requested");
        if let Err(e) = self.inner.transport.close().await {
            tracing::warn!("Error closing transport: {}", e);
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state() {
            SessionState::Connected => Ok(()),
            SessionState::Connecting => Err(RequestError::invalid_state("session not connected")),
            SessionState::Disconnected => Err(RequestError::Disconnected),
        }
    }

    fn wire_subscribers(&self) {
        let dispatcher = &self.inner.dispatcher;
        let mut ids = Vec::with_capacity(5);

        let acks = Arc::clone(&self.inner.acks);
        let correlator = Arc::clone(&self.inner.correlator);
        let directory = Arc::clone(&self.inner.directory);
        ids.push(dispatcher.subscribe(Category::Packet, move |envelope| {
            let Some(packet) = envelope.packet() else {
                return;
            };
            if let Some(ack) = ack_info(packet) {
                let record = acks.record_ack(ack.request_id, ack.from, ack.hops_away, ack.error_code);
                directory.apply_ack(&record);
            }
            correlator.handle_packet(packet);
            directory.apply_packet(packet);
        }));

        let directory = Arc::clone(&self.inner.directory);
        ids.push(dispatcher.subscribe(Category::NodeInfo, move |envelope| {
            if let InboundEnvelope::NodeInfo(info) = envelope {
                directory.apply_node_info(info);
            }
        }));

        let directory = Arc::clone(&self.inner.directory);
        ids.push(dispatcher.subscribe(Category::Channel, move |envelope| {
            if let InboundEnvelope::Channel(channel) = envelope {
                directory.apply_channel(channel);
            }
        }));

        let directory = Arc::clone(&self.inner.directory);
        ids.push(dispatcher.subscribe(Category::MyNodeInfo, move |envelope| {
            if let InboundEnvelope::MyNodeInfo(info) = envelope {
                directory.apply_my_info(info);
            }
        }));

        let directory = Arc::clone(&self.inner.directory);
        ids.push(dispatcher.subscribe(Category::DeviceStatus, move |envelope| {
            match envelope {
                InboundEnvelope::DeviceStatus(DeviceStatus::Metadata(meta)) => {
                    directory.apply_metadata(meta);
                }
                InboundEnvelope::DeviceStatus(DeviceStatus::Rebooted) => {
                    tracing::warn!("Device reported a reboot");
                }
                _ => {}
            }
        }));

        *self
            .inner
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = ids;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Sending
// ═══════════════════════════════════════════════════════════════════════════

impl Session {
    /// Send a packet without waiting for anything. Returns its packet id.
    ///
    /// # Errors
    /// `Encode` for oversize payloads, `Transport` when the send fails,
    /// `Disconnected`/`InvalidState` when the session is not connected.
    pub async fn send_packet(&self, packet: OutboundPacket) -> Result<CorrelationId> {
        self.ensure_connected()?;
        let id = self.next_id();
        let mesh = self.build_packet(id, &packet)?;
        self.send_record(&ToRadio::packet(mesh)).await?;
        tracing::debug!(
            "Sent {} as packet {} to {:08x} on channel {}",
            packet.operation,
            id,
            packet.to,
            packet.channel
        );
        Ok(id)
    }

    /// Send a packet and wait for the correlated reply.
    ///
    /// The waiter is registered before the packet leaves. Replies are only
    /// accepted from `packet.to` unless it is the broadcast address.
    ///
    /// # Errors
    /// `Timeout` after `timeout`, `Routing` for error replies, `Transport`
    /// immediately when the send fails, `Disconnected` on connection loss.
    pub async fn request(
        &self,
        packet: OutboundPacket,
        kind: ResponseKind,
        timeout: Duration,
    ) -> Result<MeshPacket> {
        self.ensure_connected()?;
        let id = self.next_id();
        let mesh = self.build_packet(id, &packet)?;
        let expected_from = (!packet.is_broadcast()).then_some(packet.to);

        let pending = self.inner.correlator.register(
            id,
            expected_from,
            kind,
            timeout,
            packet.operation.clone(),
        )?;

        if let Err(err) = self.send_record(&ToRadio::packet(mesh)).await {
            pending.abort(err.clone());
            return Err(err);
        }
        tracing::debug!(
            "Sent {} as packet {} to {:08x}, waiting up to {:?}",
            packet.operation,
            id,
            packet.to,
            timeout
        );
        pending.wait().await
    }

    fn next_id(&self) -> CorrelationId {
        let correlator = &self.inner.correlator;
        self.inner.ids.next(|id| correlator.is_live(id))
    }

    fn build_packet(&self, id: CorrelationId, packet: &OutboundPacket) -> Result<MeshPacket> {
        if packet.payload.len() > MAX_DATA_PAYLOAD {
            return Err(CodecError::TooLarge {
                kind: MessageKind::Data,
                size: packet.payload.len(),
                limit: MAX_DATA_PAYLOAD,
            }
            .into());
        }

        let mut mesh = MeshPacket {
            from: self.inner.directory.my_node_num(),
            to: packet.to,
            channel: packet.channel,
            id,
            hop_limit: self.inner.config.hop_limit,
            want_ack: packet.want_ack,
            priority: mesh_packet::Priority::Reliable as i32,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                portnum: packet.port as i32,
                payload: packet.payload.clone(),
                want_response: packet.want_response,
                ..Default::default()
            })),
            ..Default::default()
        };
        if packet.channel == PKC_CHANNEL_INDEX {
            mesh.pki_encrypted = true;
            mesh.public_key = self.inner.directory.public_key(packet.to);
        }
        Ok(mesh)
    }

    async fn send_record(&self, record: &ToRadio) -> Result<()> {
        let bytes = encode_bounded(record, MAX_FRAME_PAYLOAD)?;
        self.inner.transport.send(&bytes).await?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Accessors
// ═══════════════════════════════════════════════════════════════════════════

impl Session {
    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Node, channel and message directory
    pub fn directory(&self) -> &Directory {
        &self.inner.directory
    }

    /// Ack log
    pub fn acks(&self) -> &AckTracker {
        &self.inner.acks
    }

    /// Response correlator
    pub fn correlator(&self) -> &Correlator {
        &self.inner.correlator
    }

    /// Inbound record dispatcher. Application subscribers may be added.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// The underlying transport
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }
}

impl SessionInner {
    fn set_state(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                tracing::debug!("Session {:?} -> {:?}", *current, next);
                *current = next;
                true
            } else {
                false
            }
        })
    }

    fn track(&self, task: JoinHandle<()>) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task);
    }

    /// Enter the terminal state and release every waiter.
    fn shut_down(&self, reason: &str) {
        if !self.set_state(SessionState::Disconnected) {
            return;
        }
        let flushed = self.correlator.close();
        self.acks.close();
        tracing::info!(
            "Session disconnected ({}), {} pending requests rejected",
            reason,
            flushed
        );

        for id in self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            self.dispatcher.unsubscribe(id);
        }
        for task in self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            task.abort();
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.correlator.close();
        self.acks.close();
        for task in self
            .tasks
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            task.abort();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Background tasks
// ═══════════════════════════════════════════════════════════════════════════

async fn dispatch_loop(
    session: Weak<SessionInner>,
    correlator: Arc<Correlator>,
    mut events: TransportEvents,
) {
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(inner) = session.upgrade() else {
                    break;
                };
                match event {
                    Some(TransportEvent::Frame(bytes)) => {
                        tracing::trace!("Inbound frame, {} bytes", bytes.len());
                        // Undecodable frames are logged by the dispatcher
                        let _ = inner.dispatcher.dispatch_frame(&bytes);
                    }
                    Some(TransportEvent::Status(ConnectionStatus::Connected)) => {
                        inner.set_state(SessionState::Connected);
                    }
                    Some(TransportEvent::Status(ConnectionStatus::Connecting)) => {}
                    Some(TransportEvent::Status(ConnectionStatus::Disconnected)) | None => {
                        inner.shut_down("transport disconnected");
                        break;
                    }
                }
            }
            _ = sweep.tick() => {
                let expired = correlator.expire_overdue(Instant::now());
                if expired > 0 {
                    tracing::debug!("Expired {} overdue waiters", expired);
                }
            }
        }
    }
}

async fn heartbeat_loop(session: Weak<SessionInner>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = session.upgrade() else {
            break;
        };
        if *inner.state.borrow() == SessionState::Disconnected {
            break;
        }
        let session = Session { inner };
        match session.send_record(&ToRadio::heartbeat()).await {
            Ok(()) => tracing::trace!("Heartbeat sent"),
            Err(e) => tracing::warn!("Heartbeat failed: {}", e),
        }
    }
}
