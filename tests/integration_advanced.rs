//! Integration tests for the request builders on a configured session.
//!
//! Each test runs the config handshake first, so the directory knows the
//! attached node, its peers and the channel table.

use meshlink_core::{Direction, RequestError};
use meshlink_core::api::file_transfer::parse_file_transfer;
use meshlink_integration_tests::fixtures::fake_radio::{
    MY_NODE, RadioFixture, node_info, primary_channel, secondary_channel,
};
use meshlink_integration_tests::test_helpers::eventually;
use meshlink_proto::{
    AdminMessage, BROADCAST_ADDR, DeviceMetrics, NodeInfo, PKC_CHANNEL_INDEX, PortNum, Position,
    RouteDiscovery, Telemetry, ToRadio, User,
    admin_message::PayloadVariant as Admin, decode_as, encode, file_transfer_packet::Item,
    to_radio,
};
use std::time::Duration;

const RELAY: u32 = 0x1111_0001;
const HILLTOP: u32 = 0x1111_0002;

fn peers() -> Vec<NodeInfo> {
    let mut hilltop = node_info(HILLTOP, "Hilltop", "HT");
    hilltop.channel = 1;
    vec![node_info(RELAY, "Relay", "RLY"), hilltop]
}

fn admin_payload(packet: &meshlink_proto::MeshPacket) -> AdminMessage {
    let data = packet.decoded().expect("admin packet not decoded");
    assert_eq!(data.portnum(), PortNum::AdminApp);
    decode_as::<AdminMessage>(&data.payload).unwrap()
}

// ============================================================================
// Config handshake
// ============================================================================

/// The config dump fills the directory.
#[tokio::test]
async fn test_configure_populates_directory() {
    let fixture = RadioFixture::configured(&peers()).await;
    let directory = fixture.session.directory();

    assert_eq!(directory.my_node(), Some(MY_NODE));
    assert_eq!(directory.my_user().unwrap().long_name, "Base");
    assert_eq!(directory.nodes().len(), 3);
    assert_eq!(directory.node(HILLTOP).unwrap().channel, 1);
    assert_eq!(directory.channels().len(), 1);
    assert_eq!(directory.node_channel(HILLTOP), 1);
    assert_eq!(directory.node_channel(0xdead), 0);

    fixture.shutdown().await;
}

/// A dump that never completes fails the handshake.
#[tokio::test(start_paused = true)]
async fn test_configure_times_out_without_dump() {
    let fixture = RadioFixture::new().await;
    let err = fixture.session.configure().await.unwrap_err();
    assert!(matches!(err, RequestError::Timeout { .. }));

    // The request itself went out
    match fixture.radio.next_record().await.payload_variant {
        Some(to_radio::PayloadVariant::WantConfigId(nonce)) => assert_ne!(nonce, 0),
        other => panic!("expected want_config, got {other:?}"),
    }
    fixture.shutdown().await;
}

// ============================================================================
// Admin channel selection
// ============================================================================

/// Admin traffic uses a channel named "admin" when one exists.
#[tokio::test]
async fn test_admin_uses_named_channel() {
    let channels = [primary_channel(), secondary_channel(2, "Admin")];
    let fixture =
        RadioFixture::configured_with(Default::default(), &peers(), &channels).await;
    let session = fixture.session.clone();
    let _call = tokio::spawn(async move { session.admin().get_owner(RELAY).await });

    let request = fixture.radio.next_packet().await;
    assert_eq!(request.channel, 2);
    assert!(!request.pki_encrypted);

    fixture.shutdown().await;
}

/// Nodes with a known public key are administered over PKI.
#[tokio::test]
async fn test_admin_uses_pki_for_known_keys() {
    let mut keyed = node_info(RELAY, "Relay", "RLY");
    if let Some(user) = keyed.user.as_mut() {
        user.public_key = vec![0xab; 32];
    }
    let fixture = RadioFixture::configured(&[keyed]).await;
    let session = fixture.session.clone();
    let _call = tokio::spawn(async move { session.admin().get_lora_config(RELAY).await });

    let request = fixture.radio.next_packet().await;
    assert_eq!(request.channel, PKC_CHANNEL_INDEX);
    assert!(request.pki_encrypted);
    assert_eq!(request.public_key, vec![0xab; 32]);

    fixture.shutdown().await;
}

// ============================================================================
// Admin requests
// ============================================================================

/// Channel requests are numbered from 1 on the wire.
#[tokio::test]
async fn test_get_channel_sends_one_based_index() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let call = tokio::spawn(async move { session.admin().get_channel(RELAY, 2).await });

    let request = fixture.radio.next_packet().await;
    assert_eq!(
        admin_payload(&request).payload_variant,
        Some(Admin::GetChannelRequest(3))
    );
    fixture.radio.admin_reply(
        RELAY,
        request.id,
        AdminMessage::new(Admin::GetChannelResponse(secondary_channel(2, "ops"))),
    );

    let channel = call.await.unwrap().unwrap();
    assert_eq!(channel.index, 2);
    assert_eq!(channel.name(), "ops");

    fixture.shutdown().await;
}

/// A reply of the wrong kind is reported, not silently accepted.
#[tokio::test]
async fn test_unexpected_admin_reply() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let call = tokio::spawn(async move { session.admin().get_device_metadata(RELAY).await });

    let request = fixture.radio.next_packet().await;
    fixture.radio.admin_reply(
        RELAY,
        request.id,
        AdminMessage::new(Admin::GetOwnerResponse(User::default())),
    );

    match call.await.unwrap().unwrap_err() {
        RequestError::UnexpectedResponse { expected, got } => {
            assert_eq!(expected, "get_device_metadata_response");
            assert_eq!(got, "get_owner_response");
        }
        other => panic!("expected UnexpectedResponse, got {other:?}"),
    }

    fixture.shutdown().await;
}

/// Setting our own owner updates the directory once acked.
#[tokio::test]
async fn test_set_own_owner_updates_directory() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let renamed = User {
        long_name: "Basecamp".into(),
        short_name: "BC".into(),
        ..Default::default()
    };
    let call = {
        let renamed = renamed.clone();
        tokio::spawn(async move { session.admin().set_owner(MY_NODE, renamed).await })
    };

    let request = fixture.radio.next_packet().await;
    assert_eq!(request.to, MY_NODE);
    assert_eq!(admin_payload(&request).payload_variant, Some(Admin::SetOwner(renamed)));
    fixture.radio.ack(MY_NODE, request.id, 0);

    call.await.unwrap().unwrap();
    let directory = fixture.session.directory();
    assert_eq!(directory.my_user().unwrap().long_name, "Basecamp");
    assert_eq!(
        directory.node(MY_NODE).unwrap().user.unwrap().short_name,
        "BC"
    );

    fixture.shutdown().await;
}

/// Local admin messages go to the attached node without waiting.
#[tokio::test]
async fn test_local_admin_is_fire_and_forget() {
    let fixture = RadioFixture::configured(&peers()).await;
    let admin = fixture.session.admin();

    admin.set_time(Some(1_700_000_000)).await.unwrap();
    let request = fixture.radio.next_packet().await;
    assert_eq!(request.to, MY_NODE);
    assert_eq!(request.channel, 0);
    assert_eq!(
        admin_payload(&request).payload_variant,
        Some(Admin::SetTimeOnly(1_700_000_000))
    );

    admin.set_favourite_node(RELAY, true).await.unwrap();
    let request = fixture.radio.next_packet().await;
    assert_eq!(admin_payload(&request).payload_variant, Some(Admin::SetFavoriteNode(RELAY)));
    assert!(fixture.session.directory().node(RELAY).unwrap().is_favorite);

    admin.remove_node(HILLTOP).await.unwrap();
    let request = fixture.radio.next_packet().await;
    assert_eq!(admin_payload(&request).payload_variant, Some(Admin::RemoveByNodenum(HILLTOP)));
    assert!(fixture.session.directory().node(HILLTOP).is_none());

    assert_eq!(fixture.session.correlator().stats().registered, 0);
    fixture.shutdown().await;
}

/// Local admin needs to know which node is attached.
#[tokio::test]
async fn test_local_admin_requires_own_node() {
    let fixture = RadioFixture::new().await;
    let err = fixture.session.admin().set_time(None).await.unwrap_err();
    assert!(matches!(err, RequestError::InvalidState(_)));
    fixture.shutdown().await;
}

// ============================================================================
// Application requests
// ============================================================================

/// Telemetry exchange returns the peer's device metrics.
#[tokio::test]
async fn test_device_metrics_exchange() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let call = tokio::spawn(async move { session.request_device_metrics(HILLTOP).await });

    let request = fixture.radio.next_packet().await;
    assert_eq!(request.channel, 1);
    let data = request.decoded().unwrap();
    assert_eq!(data.portnum(), PortNum::TelemetryApp);
    assert!(data.want_response);

    let theirs = DeviceMetrics {
        battery_level: Some(87),
        voltage: Some(4.01),
        ..Default::default()
    };
    fixture.radio.reply(
        HILLTOP,
        request.id,
        PortNum::TelemetryApp,
        encode(&Telemetry::device(0, theirs)),
    );
    assert_eq!(call.await.unwrap().unwrap(), theirs);

    fixture.shutdown().await;
}

/// Position requests return the peer's position.
#[tokio::test]
async fn test_position_exchange() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let call = tokio::spawn(async move { session.request_position(RELAY).await });

    let request = fixture.radio.next_packet().await;
    assert_eq!(request.decoded().unwrap().portnum(), PortNum::PositionApp);

    let position = Position {
        latitude_i: Some(474_000_000),
        longitude_i: Some(85_000_000),
        ..Default::default()
    };
    fixture
        .radio
        .reply(RELAY, request.id, PortNum::PositionApp, encode(&position));
    let got = call.await.unwrap().unwrap();
    assert_eq!(got.latitude_i, Some(474_000_000));

    fixture.shutdown().await;
}

/// Node info requests carry our identity and return theirs.
#[tokio::test]
async fn test_node_info_exchange() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let call = tokio::spawn(async move { session.request_node_info(RELAY).await });

    let request = fixture.radio.next_packet().await;
    let sent: User = decode_as(&request.decoded().unwrap().payload).unwrap();
    assert_eq!(sent.long_name, "Base");

    let theirs = node_info(RELAY, "Relay v2", "RL2").user.unwrap();
    fixture
        .radio
        .reply(RELAY, request.id, PortNum::NodeinfoApp, encode(&theirs));
    assert_eq!(call.await.unwrap().unwrap().long_name, "Relay v2");

    fixture.shutdown().await;
}

/// Traceroute returns both directions of the route.
#[tokio::test]
async fn test_traceroute() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let call = tokio::spawn(async move { session.trace_route(HILLTOP, None).await });

    let request = fixture.radio.next_packet().await;
    assert_eq!(request.decoded().unwrap().portnum(), PortNum::TracerouteApp);

    let discovered = RouteDiscovery {
        route: vec![RELAY],
        route_back: vec![RELAY],
        ..Default::default()
    };
    fixture
        .radio
        .reply(HILLTOP, request.id, PortNum::TracerouteApp, encode(&discovered));
    let route = call.await.unwrap().unwrap();
    assert_eq!(route.route, vec![RELAY]);
    assert_eq!(route.route_back, vec![RELAY]);

    fixture.shutdown().await;
}

/// Concurrent requests resolve independently of reply order.
#[tokio::test]
async fn test_replies_out_of_order() {
    let fixture = RadioFixture::configured(&peers()).await;
    let first = {
        let session = fixture.session.clone();
        tokio::spawn(async move { session.admin().get_owner(RELAY).await })
    };
    let second = {
        let session = fixture.session.clone();
        tokio::spawn(async move { session.admin().get_owner(HILLTOP).await })
    };

    let a = fixture.radio.next_packet().await;
    let b = fixture.radio.next_packet().await;
    assert_ne!(a.id, b.id);

    for request in [&b, &a] {
        let name = if request.to == RELAY { "relay" } else { "hilltop" };
        fixture.radio.admin_reply(
            request.to,
            request.id,
            AdminMessage::new(Admin::GetOwnerResponse(User {
                long_name: name.into(),
                ..Default::default()
            })),
        );
    }

    assert_eq!(first.await.unwrap().unwrap().long_name, "relay");
    assert_eq!(second.await.unwrap().unwrap().long_name, "hilltop");
    fixture.shutdown().await;
}

// ============================================================================
// Text messages
// ============================================================================

/// Sent texts are logged and marked acked; inbound texts are logged too.
#[tokio::test]
async fn test_text_message_log() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = &fixture.session;

    let id = session.send_text(BROADCAST_ADDR, 0, "hello mesh").await.unwrap();
    let sent = fixture.radio.next_packet().await;
    assert_eq!(sent.id, id);
    assert_eq!(sent.to, BROADCAST_ADDR);
    assert_eq!(sent.decoded().unwrap().payload, b"hello mesh");

    fixture.radio.ack(RELAY, id, 1);
    fixture
        .radio
        .reply(HILLTOP, 0, PortNum::TextMessageApp, b"hi base".to_vec());

    let directory = session.directory();
    assert!(eventually(Duration::from_secs(2), || directory.messages().len() == 2).await);
    assert!(
        eventually(Duration::from_secs(2), || {
            directory.messages()[0].acked_by == Some(RELAY)
        })
        .await
    );

    let messages = directory.messages();
    assert_eq!(messages[0].direction, Direction::Outbound);
    assert_eq!(messages[1].direction, Direction::Inbound);
    assert_eq!(messages[1].from, HILLTOP);
    assert_eq!(messages[1].text, "hi base");

    fixture.shutdown().await;
}

// ============================================================================
// File transfer
// ============================================================================

/// An offer goes out as a private-app packet and the peer's chunk request
/// comes back through the parser.
#[tokio::test]
async fn test_file_transfer_offer_and_chunk_request() {
    let fixture = RadioFixture::configured(&peers()).await;
    let session = fixture.session.clone();
    let call =
        tokio::spawn(async move { session.file_transfer().offer(RELAY, 9, "log.txt", 640).await });

    let offer = fixture.radio.next_packet().await;
    assert!(matches!(
        parse_file_transfer(&offer),
        Some(Item::OfferFileTransfer(ref o)) if o.id == 9 && o.file_size == 640
    ));
    fixture.radio.ack(RELAY, offer.id, 1);
    call.await.unwrap().unwrap();

    // The peer asks for the first chunk
    let request = meshlink_proto::FileTransferPacket::new(Item::RequestFileChunk(
        meshlink_proto::file_transfer::RequestFileChunk {
            file_transfer_id: 9,
            offset: 0,
            length: 200,
        },
    ));
    let inbound = meshlink_integration_tests::fixtures::fake_radio::reply_packet(
        RELAY,
        0,
        PortNum::PrivateApp,
        encode(&request),
    );
    match parse_file_transfer(&inbound) {
        Some(Item::RequestFileChunk(chunk)) => assert_eq!(chunk.length, 200),
        other => panic!("expected chunk request, got {other:?}"),
    }

    fixture.shutdown().await;
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Disconnecting tells the device before closing the link.
#[tokio::test]
async fn test_disconnect_notice() {
    let fixture = RadioFixture::configured(&peers()).await;
    fixture.session.disconnect().await;

    let mut saw_notice = false;
    while let Some(frame) = fixture.radio.handle().try_next_sent() {
        if let Ok(ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Disconnect(true)),
        }) = decode_as::<ToRadio>(&frame)
        {
            saw_notice = true;
        }
    }
    assert!(saw_notice);
    assert!(fixture.radio.handle().is_closed());
}
