//! Fake radio fixture for integration testing
//!
//! Wraps an in-memory link so a test can play the attached device:
//! - Start a [`Session`] against it
//! - Answer the config handshake
//! - Read the packets the client sent
//! - Reply with acks, naks and application payloads
//!
//! # Example
//!
//! ```no_run
//! use meshlink_integration_tests::fixtures::fake_radio::RadioFixture;
//!
//! #[tokio::test]
//! async fn test_owner() {
//!     let fixture = RadioFixture::configured(&[]).await;
//!     let session = fixture.session.clone();
//!     let call = tokio::spawn(async move { session.admin().get_owner(5).await });
//!
//!     let request = fixture.radio.next_packet().await;
//!     // ... reply to request.id ...
//!
//!     fixture.shutdown().await;
//! }
//! ```

use meshlink_core::{Session, SessionConfig};
use meshlink_proto::{
    AdminMessage, Channel, ChannelSettings, Data, FromRadio, MeshPacket, MyNodeInfo, NodeInfo,
    PortNum, Routing, ToRadio, User, channel, decode_as, encode, from_radio, mesh_packet, routing,
    to_radio,
};
use meshlink_transport::{MemoryTransport, RadioHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Node number the fake device reports as its own
pub const MY_NODE: u32 = 0x0a0b_0c0d;

/// Hop limit the fake mesh stamps on originated replies
pub const REPLY_HOP_START: u32 = 3;

/// How long helpers wait for the client before failing the test
const SENT_WAIT: Duration = Duration::from_secs(10);

/// Device side of an in-memory link
pub struct FakeRadio {
    handle: RadioHandle,
    next_record_id: AtomicU32,
}

impl FakeRadio {
    /// Wrap a radio handle
    pub fn new(handle: RadioHandle) -> Self {
        Self {
            handle,
            next_record_id: AtomicU32::new(1),
        }
    }

    /// The underlying handle
    pub fn handle(&self) -> &RadioHandle {
        &self.handle
    }

    /// Next record the client sent
    ///
    /// # Panics
    ///
    /// Panics if nothing arrives in time or the record does not decode.
    pub async fn next_record(&self) -> ToRadio {
        let frame = tokio::time::timeout(SENT_WAIT, self.handle.next_sent())
            .await
            .expect("client sent nothing")
            .expect("link closed");
        decode_as::<ToRadio>(&frame).expect("client sent an undecodable record")
    }

    /// Next mesh packet the client sent, skipping other records
    pub async fn next_packet(&self) -> MeshPacket {
        loop {
            if let Some(to_radio::PayloadVariant::Packet(packet)) =
                self.next_record().await.payload_variant
            {
                return packet;
            }
        }
    }

    /// Deliver a raw record to the client
    pub fn deliver(&self, variant: from_radio::PayloadVariant) -> usize {
        let record = FromRadio {
            id: self.next_record_id.fetch_add(1, Ordering::Relaxed),
            payload_variant: Some(variant),
        };
        self.handle.inject_frame(encode(&record))
    }

    /// Deliver a mesh packet to the client
    pub fn deliver_packet(&self, packet: MeshPacket) -> usize {
        self.deliver(from_radio::PayloadVariant::Packet(packet))
    }

    /// Clean routing ack from `from` for `request_id`, `hops` relays away
    pub fn ack(&self, from: u32, request_id: u32, hops: u32) {
        let payload = encode(&Routing::error(routing::Error::None));
        let mut packet = reply_packet(from, request_id, PortNum::RoutingApp, payload);
        packet.hop_limit = REPLY_HOP_START.saturating_sub(hops);
        self.deliver_packet(packet);
    }

    /// Routing failure from `from` for `request_id`
    pub fn nak(&self, from: u32, request_id: u32, reason: routing::Error) {
        let payload = encode(&Routing::error(reason));
        self.deliver_packet(reply_packet(from, request_id, PortNum::RoutingApp, payload));
    }

    /// Application reply from `from` for `request_id`
    pub fn reply(&self, from: u32, request_id: u32, port: PortNum, payload: Vec<u8>) {
        self.deliver_packet(reply_packet(from, request_id, port, payload));
    }

    /// Admin reply from `from` for `request_id`
    pub fn admin_reply(&self, from: u32, request_id: u32, message: AdminMessage) {
        self.reply(from, request_id, PortNum::AdminApp, encode(&message));
    }

    /// Answer a pending `want_config` request with a minimal config dump
    pub async fn serve_config(&self, nodes: &[NodeInfo], channels: &[Channel]) {
        let nonce = loop {
            if let Some(to_radio::PayloadVariant::WantConfigId(nonce)) =
                self.next_record().await.payload_variant
            {
                break nonce;
            }
        };
        self.deliver(from_radio::PayloadVariant::MyInfo(MyNodeInfo {
            my_node_num: MY_NODE,
            ..Default::default()
        }));
        self.deliver(from_radio::PayloadVariant::NodeInfo(node_info(
            MY_NODE, "Base", "BASE",
        )));
        for node in nodes {
            self.deliver(from_radio::PayloadVariant::NodeInfo(node.clone()));
        }
        for channel in channels {
            self.deliver(from_radio::PayloadVariant::Channel(channel.clone()));
        }
        self.deliver(from_radio::PayloadVariant::ConfigCompleteId(nonce));
    }

    /// Make the next `n` sends fail
    pub fn fail_next_sends(&self, n: usize) {
        self.handle.fail_next_sends(n);
    }

    /// Drop the link from the device side
    pub fn disconnect(&self) {
        self.handle.disconnect();
    }
}

/// A session connected to a fake radio
pub struct RadioFixture {
    /// Client under test
    pub session: Session,
    /// Device side
    pub radio: Arc<FakeRadio>,
}

impl RadioFixture {
    /// Start a session with default settings
    ///
    /// # Panics
    ///
    /// Panics if the session does not start.
    pub async fn new() -> Self {
        Self::with_config(SessionConfig::default()).await
    }

    /// Start a session with custom settings
    pub async fn with_config(config: SessionConfig) -> Self {
        let (transport, handle) = MemoryTransport::pair();
        let session = Session::new(Arc::new(transport), config);
        session.start().await.expect("session failed to start");
        Self {
            session,
            radio: Arc::new(FakeRadio::new(handle)),
        }
    }

    /// Start a session and run the config handshake with `nodes` plus a
    /// primary channel
    pub async fn configured(nodes: &[NodeInfo]) -> Self {
        Self::configured_with(SessionConfig::default(), nodes, &[primary_channel()]).await
    }

    /// Start a session and run the config handshake
    pub async fn configured_with(
        config: SessionConfig,
        nodes: &[NodeInfo],
        channels: &[Channel],
    ) -> Self {
        let fixture = Self::with_config(config).await;
        let radio = Arc::clone(&fixture.radio);
        let nodes = nodes.to_vec();
        let channels = channels.to_vec();
        let server = tokio::spawn(async move { radio.serve_config(&nodes, &channels).await });
        fixture
            .session
            .configure()
            .await
            .expect("config handshake failed");
        server.await.expect("config server panicked");
        fixture
    }

    /// Disconnect the session
    pub async fn shutdown(self) {
        self.session.disconnect().await;
    }
}

/// A packet from `from` to [`MY_NODE`] answering `request_id`
pub fn reply_packet(from: u32, request_id: u32, port: PortNum, payload: Vec<u8>) -> MeshPacket {
    MeshPacket {
        from,
        to: MY_NODE,
        id: rand::random::<u32>() | 1,
        hop_start: REPLY_HOP_START,
        hop_limit: REPLY_HOP_START,
        payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
            portnum: port as i32,
            payload,
            request_id,
            ..Default::default()
        })),
        ..Default::default()
    }
}

/// A node database entry
pub fn node_info(num: u32, long_name: &str, short_name: &str) -> NodeInfo {
    NodeInfo {
        num,
        user: Some(User {
            id: meshlink_proto::node_id_string(num),
            long_name: long_name.to_string(),
            short_name: short_name.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Primary channel in slot 0
pub fn primary_channel() -> Channel {
    Channel {
        index: 0,
        settings: Some(ChannelSettings {
            psk: vec![1],
            ..Default::default()
        }),
        role: channel::Role::Primary as i32,
    }
}

/// Secondary channel named `name` in slot `index`
pub fn secondary_channel(index: i32, name: &str) -> Channel {
    Channel {
        index,
        settings: Some(ChannelSettings {
            name: name.to_string(),
            psk: vec![7; 16],
            ..Default::default()
        }),
        role: channel::Role::Secondary as i32,
    }
}
