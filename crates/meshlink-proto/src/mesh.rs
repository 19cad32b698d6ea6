//! Core mesh messages: packets, application payloads, routing and the
//! radio envelopes exchanged with the device.
//!
//! Field numbers follow the device's `mesh.proto` and `portnums.proto` so that
//! bytes produced here are accepted by real radios. Only the fields this
//! client reads or writes are declared; unknown fields are skipped on decode.

/// Application port numbers carried in [`Data::portnum`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PortNum {
    /// Unknown or unset
    UnknownApp = 0,
    /// UTF-8 text message
    TextMessageApp = 1,
    /// Remote GPIO control
    RemoteHardwareApp = 2,
    /// `Position` payload
    PositionApp = 3,
    /// `User` payload (node info exchange)
    NodeinfoApp = 4,
    /// `Routing` payload (acks, naks, route discovery)
    RoutingApp = 5,
    /// `AdminMessage` payload
    AdminApp = 6,
    /// Compressed text message
    TextMessageCompressedApp = 7,
    /// Waypoint payload
    WaypointApp = 8,
    /// Codec2 audio
    AudioApp = 9,
    /// Detection sensor events
    DetectionSensorApp = 10,
    /// Ping-reply service
    ReplyApp = 32,
    /// IP tunnel
    IpTunnelApp = 33,
    /// Paxcounter
    PaxcounterApp = 34,
    /// Serial bridge
    SerialApp = 64,
    /// Store and forward
    StoreForwardApp = 65,
    /// Range test
    RangeTestApp = 66,
    /// `Telemetry` payload
    TelemetryApp = 67,
    /// Zero-GPS positioning
    ZpsApp = 68,
    /// Simulator
    SimulatorApp = 69,
    /// `RouteDiscovery` payload
    TracerouteApp = 70,
    /// Neighbor info
    NeighborinfoApp = 71,
    /// ATAK plugin
    AtakPlugin = 72,
    /// Map report
    MapReportApp = 73,
    /// Power stress testing
    PowerstressApp = 74,
    /// Private application traffic (pings, file transfer)
    PrivateApp = 256,
    /// ATAK forwarder
    AtakForwarder = 257,
    /// Upper bound of the port space
    Max = 511,
}

/// The application payload of a decoded packet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Data {
    /// Port the payload belongs to
    #[prost(enumeration = "PortNum", tag = "1")]
    pub portnum: i32,
    /// Encoded application message
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    /// Ask the destination for an application-level reply
    #[prost(bool, tag = "3")]
    pub want_response: bool,
    /// Final destination when relayed
    #[prost(fixed32, tag = "4")]
    pub dest: u32,
    /// Original source when relayed
    #[prost(fixed32, tag = "5")]
    pub source: u32,
    /// Id of the packet this one answers (0 = not a reply)
    #[prost(fixed32, tag = "6")]
    pub request_id: u32,
    /// Id of the message this one replies to in a conversation
    #[prost(fixed32, tag = "7")]
    pub reply_id: u32,
    /// Non-zero when the payload is an emoji reaction
    #[prost(fixed32, tag = "8")]
    pub emoji: u32,
    /// Device capability bits
    #[prost(uint32, optional, tag = "9")]
    pub bitfield: Option<u32>,
}

/// A packet travelling through the mesh.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MeshPacket {
    /// Sending node number
    #[prost(fixed32, tag = "1")]
    pub from: u32,
    /// Destination node number (`BROADCAST_ADDR` for everyone)
    #[prost(fixed32, tag = "2")]
    pub to: u32,
    /// Channel index (or hash, for packets off the air)
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    /// Decoded or still-encrypted payload
    #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
    pub payload_variant: Option<mesh_packet::PayloadVariant>,
    /// Packet id, echoed back as `Data::request_id` by replies
    #[prost(fixed32, tag = "6")]
    pub id: u32,
    /// Receive time (seconds since epoch)
    #[prost(fixed32, tag = "7")]
    pub rx_time: u32,
    /// Receive SNR
    #[prost(float, tag = "8")]
    pub rx_snr: f32,
    /// Remaining hops
    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,
    /// Ask for a delivery acknowledgment
    #[prost(bool, tag = "10")]
    pub want_ack: bool,
    /// Transmit priority
    #[prost(enumeration = "mesh_packet::Priority", tag = "11")]
    pub priority: i32,
    /// Receive RSSI
    #[prost(int32, tag = "12")]
    pub rx_rssi: i32,
    /// Packet arrived through an MQTT gateway
    #[prost(bool, tag = "14")]
    pub via_mqtt: bool,
    /// Hop limit the packet started with
    #[prost(uint32, tag = "15")]
    pub hop_start: u32,
    /// Destination public key for PKI encrypted packets
    #[prost(bytes = "vec", tag = "16")]
    pub public_key: Vec<u8>,
    /// Payload is PKI encrypted
    #[prost(bool, tag = "17")]
    pub pki_encrypted: bool,
}

/// Nested types for [`MeshPacket`].
pub mod mesh_packet {
    /// Transmit priority levels
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Priority {
        /// Let the device decide
        Unset = 0,
        /// Lowest priority
        Min = 1,
        /// Background traffic
        Background = 10,
        /// Default for most traffic
        Default = 64,
        /// Packets that want an ack
        Reliable = 70,
        /// Replies to requests
        Response = 80,
        /// High priority
        High = 100,
        /// Acks
        Ack = 120,
        /// Highest priority
        Max = 127,
    }

    /// Packet payload
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// Decrypted application payload
        #[prost(message, tag = "4")]
        Decoded(super::Data),
        /// Payload we could not (or did not) decrypt
        #[prost(bytes, tag = "5")]
        Encrypted(Vec<u8>),
    }
}

impl MeshPacket {
    /// The decoded application payload, if the packet carries one.
    pub fn decoded(&self) -> Option<&Data> {
        match &self.payload_variant {
            Some(mesh_packet::PayloadVariant::Decoded(data)) => Some(data),
            _ => None,
        }
    }

    /// Number of relays the packet went through, when the sender recorded
    /// its starting hop limit.
    pub fn hops_away(&self) -> Option<u32> {
        if self.hop_start == 0 {
            return None;
        }
        Some(self.hop_start.saturating_sub(self.hop_limit))
    }
}

/// Route discovery record, the payload of traceroute replies.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RouteDiscovery {
    /// Nodes on the way towards the destination
    #[prost(fixed32, repeated, tag = "1")]
    pub route: Vec<u32>,
    /// SNR (x4) for each hop towards the destination
    #[prost(int32, repeated, tag = "2")]
    pub snr_towards: Vec<i32>,
    /// Nodes on the way back
    #[prost(fixed32, repeated, tag = "3")]
    pub route_back: Vec<u32>,
    /// SNR (x4) for each hop back
    #[prost(int32, repeated, tag = "4")]
    pub snr_back: Vec<i32>,
}

/// Routing control message carried on [`PortNum::RoutingApp`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Routing {
    /// Request, reply or error
    #[prost(oneof = "routing::Variant", tags = "1, 2, 3")]
    pub variant: Option<routing::Variant>,
}

/// Nested types for [`Routing`].
pub mod routing {
    /// Routing failure reasons reported by the device or the destination
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Error {
        /// Delivered (plain ack)
        None = 0,
        /// No route to the destination
        NoRoute = 1,
        /// Received a NAK while relaying
        GotNak = 2,
        /// Timed out on the device
        Timeout = 3,
        /// No interface could send it
        NoInterface = 4,
        /// Retransmissions exhausted
        MaxRetransmit = 5,
        /// Destination has no matching channel
        NoChannel = 6,
        /// Packet too large
        TooLarge = 7,
        /// Destination did not answer a want_response request
        NoResponse = 8,
        /// Regional duty cycle exhausted
        DutyCycleLimit = 9,
        /// Malformed request
        BadRequest = 32,
        /// Not authorized for this request
        NotAuthorized = 33,
        /// PKI encryption failed
        PkiFailed = 34,
        /// Destination public key unknown
        PkiUnknownPubkey = 35,
        /// Admin session key rejected
        AdminBadSessionKey = 36,
        /// Admin public key not authorized
        AdminPublicKeyUnauthorized = 37,
        /// Sender is rate limited
        RateLimitExceeded = 38,
    }

    /// Routing payload
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Variant {
        /// Route discovery request
        #[prost(message, tag = "1")]
        RouteRequest(super::RouteDiscovery),
        /// Route discovery reply
        #[prost(message, tag = "2")]
        RouteReply(super::RouteDiscovery),
        /// Ack (`None`) or failure reason
        #[prost(enumeration = "Error", tag = "3")]
        ErrorReason(i32),
    }
}

impl Routing {
    /// Build a routing message carrying an error reason (`Error::None` is a
    /// plain ack).
    pub fn error(reason: routing::Error) -> Self {
        Self {
            variant: Some(routing::Variant::ErrorReason(reason as i32)),
        }
    }

    /// The raw error reason, when this routing message carries one.
    pub fn error_reason(&self) -> Option<i32> {
        match self.variant {
            Some(routing::Variant::ErrorReason(code)) => Some(code),
            _ => None,
        }
    }
}

/// Position report.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Position {
    /// Latitude in 1e-7 degrees
    #[prost(sfixed32, optional, tag = "1")]
    pub latitude_i: Option<i32>,
    /// Longitude in 1e-7 degrees
    #[prost(sfixed32, optional, tag = "2")]
    pub longitude_i: Option<i32>,
    /// Altitude in meters above MSL
    #[prost(int32, optional, tag = "3")]
    pub altitude: Option<i32>,
    /// Fix time (seconds since epoch)
    #[prost(fixed32, tag = "4")]
    pub time: u32,
    /// Satellites in view
    #[prost(uint32, tag = "19")]
    pub sats_in_view: u32,
    /// Precision of the reported location
    #[prost(uint32, tag = "23")]
    pub precision_bits: u32,
}

impl Position {
    /// Latitude in degrees.
    pub fn latitude(&self) -> Option<f64> {
        self.latitude_i.map(|v| f64::from(v) * 1e-7)
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> Option<f64> {
        self.longitude_i.map(|v| f64::from(v) * 1e-7)
    }
}

/// A node's user identity.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct User {
    /// Node id string (`!abcd1234`)
    #[prost(string, tag = "1")]
    pub id: String,
    /// Long display name
    #[prost(string, tag = "2")]
    pub long_name: String,
    /// Up to four character name
    #[prost(string, tag = "3")]
    pub short_name: String,
    /// Hardware model
    #[prost(int32, tag = "5")]
    pub hw_model: i32,
    /// Licensed amateur radio operator
    #[prost(bool, tag = "6")]
    pub is_licensed: bool,
    /// Device role
    #[prost(int32, tag = "7")]
    pub role: i32,
    /// Curve25519 public key used for PKI
    #[prost(bytes = "vec", tag = "8")]
    pub public_key: Vec<u8>,
}

/// Device telemetry counters shared in node info and telemetry packets.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct DeviceMetrics {
    /// Battery level in percent (101 = powered)
    #[prost(uint32, optional, tag = "1")]
    pub battery_level: Option<u32>,
    /// Battery voltage
    #[prost(float, optional, tag = "2")]
    pub voltage: Option<f32>,
    /// Channel utilization in percent
    #[prost(float, optional, tag = "3")]
    pub channel_utilization: Option<f32>,
    /// Airtime used for transmit in the last hour, percent
    #[prost(float, optional, tag = "4")]
    pub air_util_tx: Option<f32>,
    /// Seconds since boot
    #[prost(uint32, optional, tag = "5")]
    pub uptime_seconds: Option<u32>,
}

/// What the device knows about another node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInfo {
    /// Node number
    #[prost(uint32, tag = "1")]
    pub num: u32,
    /// User identity
    #[prost(message, optional, tag = "2")]
    pub user: Option<User>,
    /// Last known position
    #[prost(message, optional, tag = "3")]
    pub position: Option<Position>,
    /// SNR of the last received packet
    #[prost(float, tag = "4")]
    pub snr: f32,
    /// Last time heard (seconds since epoch)
    #[prost(fixed32, tag = "5")]
    pub last_heard: u32,
    /// Last reported metrics
    #[prost(message, optional, tag = "6")]
    pub device_metrics: Option<DeviceMetrics>,
    /// Channel index the node was heard on
    #[prost(uint32, tag = "7")]
    pub channel: u32,
    /// Heard through MQTT
    #[prost(bool, tag = "8")]
    pub via_mqtt: bool,
    /// Hops between us and the node
    #[prost(uint32, optional, tag = "9")]
    pub hops_away: Option<u32>,
    /// Marked as favourite on the device
    #[prost(bool, tag = "10")]
    pub is_favorite: bool,
}

/// Information about the locally attached node.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct MyNodeInfo {
    /// Our node number
    #[prost(uint32, tag = "1")]
    pub my_node_num: u32,
    /// Number of reboots
    #[prost(uint32, tag = "8")]
    pub reboot_count: u32,
    /// Minimum client app version the firmware supports
    #[prost(uint32, tag = "11")]
    pub min_app_version: u32,
}

/// Firmware and capability metadata.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceMetadata {
    /// Firmware version string
    #[prost(string, tag = "1")]
    pub firmware_version: String,
    /// Device state schema version
    #[prost(uint32, tag = "2")]
    pub device_state_version: u32,
    /// Supports shutdown
    #[prost(bool, tag = "3")]
    pub can_shutdown: bool,
    /// Has Wi-Fi
    #[prost(bool, tag = "4")]
    pub has_wifi: bool,
    /// Has Bluetooth
    #[prost(bool, tag = "5")]
    pub has_bluetooth: bool,
    /// Has Ethernet
    #[prost(bool, tag = "6")]
    pub has_ethernet: bool,
    /// Device role
    #[prost(int32, tag = "7")]
    pub role: i32,
    /// Position flags
    #[prost(uint32, tag = "8")]
    pub position_flags: u32,
    /// Hardware model
    #[prost(int32, tag = "9")]
    pub hw_model: i32,
    /// Supports remote hardware
    #[prost(bool, tag = "10")]
    pub has_remote_hardware: bool,
}

/// Keepalive sent to the device over stream transports.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Heartbeat {}

/// Everything the device sends to the client.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FromRadio {
    /// Monotonic id of this record
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Record payload
    #[prost(oneof = "from_radio::PayloadVariant", tags = "2, 3, 4, 7, 8, 10, 13")]
    pub payload_variant: Option<from_radio::PayloadVariant>,
}

/// Nested types for [`FromRadio`].
pub mod from_radio {
    /// Payload of a device record
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// A mesh packet
        #[prost(message, tag = "2")]
        Packet(super::MeshPacket),
        /// Our node info
        #[prost(message, tag = "3")]
        MyInfo(super::MyNodeInfo),
        /// A node database entry
        #[prost(message, tag = "4")]
        NodeInfo(super::NodeInfo),
        /// End of the config dump requested with `want_config_id`
        #[prost(uint32, tag = "7")]
        ConfigCompleteId(u32),
        /// The device rebooted
        #[prost(bool, tag = "8")]
        Rebooted(bool),
        /// A channel definition
        #[prost(message, tag = "10")]
        Channel(crate::channel::Channel),
        /// Firmware metadata
        #[prost(message, tag = "13")]
        Metadata(super::DeviceMetadata),
    }
}

/// Everything the client sends to the device.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ToRadio {
    /// Record payload
    #[prost(oneof = "to_radio::PayloadVariant", tags = "1, 3, 4, 7")]
    pub payload_variant: Option<to_radio::PayloadVariant>,
}

/// Nested types for [`ToRadio`].
pub mod to_radio {
    /// Payload of a client record
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// Send a packet into the mesh
        #[prost(message, tag = "1")]
        Packet(super::MeshPacket),
        /// Ask the device to dump its config, ending with this id
        #[prost(uint32, tag = "3")]
        WantConfigId(u32),
        /// Client is going away
        #[prost(bool, tag = "4")]
        Disconnect(bool),
        /// Keepalive
        #[prost(message, tag = "7")]
        Heartbeat(super::Heartbeat),
    }
}

impl ToRadio {
    /// Wrap a packet for transmission.
    pub fn packet(packet: MeshPacket) -> Self {
        Self {
            payload_variant: Some(to_radio::PayloadVariant::Packet(packet)),
        }
    }

    /// Config dump request.
    pub fn want_config(id: u32) -> Self {
        Self {
            payload_variant: Some(to_radio::PayloadVariant::WantConfigId(id)),
        }
    }

    /// Keepalive record.
    pub fn heartbeat() -> Self {
        Self {
            payload_variant: Some(to_radio::PayloadVariant::Heartbeat(Heartbeat {})),
        }
    }

    /// Disconnect notice.
    pub fn disconnect() -> Self {
        Self {
            payload_variant: Some(to_radio::PayloadVariant::Disconnect(true)),
        }
    }
}
