//! # meshlink protocol
//!
//! Protocol messages exchanged with Meshtastic-compatible radios and the
//! encode/decode codec used by the rest of the workspace.
//!
//! Messages are declared by hand with `prost` derives. Field numbers match the
//! device protobufs, so only the subset of fields the client touches is
//! present; anything else on the wire is skipped.
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  ToRadio / FromRadio                            │
//! │   (records exchanged with the attached device)                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       MeshPacket                                │
//! │   (from, to, id, channel, hop counters, want_ack)              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                          Data                                   │
//! │   (portnum + payload + request_id correlation field)           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Routing | AdminMessage | Telemetry | Position | User | ...    │
//! │   (application messages, selected by portnum)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admin;
pub mod channel;
pub mod codec;
pub mod error;
pub mod file_transfer;
pub mod mesh;
pub mod telemetry;

pub use admin::{AdminMessage, Config, LoRaConfig, admin_message};
pub use channel::{Channel, ChannelSettings};
pub use codec::{DecodedMessage, MessageKind, WireMessage, decode, decode_as, encode, encode_bounded};
pub use error::CodecError;
pub use file_transfer::{FileTransferPacket, file_transfer_packet};
pub use mesh::{
    Data, DeviceMetadata, DeviceMetrics, FromRadio, Heartbeat, MeshPacket, MyNodeInfo, NodeInfo,
    PortNum, Position, RouteDiscovery, Routing, ToRadio, User, from_radio, mesh_packet, routing,
    to_radio,
};
pub use telemetry::{EnvironmentMetrics, Telemetry};

/// Destination address meaning "every node".
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// Pseudo channel index for PKI (public key) encrypted direct messages.
pub const PKC_CHANNEL_INDEX: u32 = 8;

/// Hop limit for originated packets.
pub const DEFAULT_HOP_LIMIT: u32 = 3;

/// Largest `Data` payload the radio accepts.
pub const MAX_DATA_PAYLOAD: usize = 233;

/// Render a node number the way devices print node ids (`!1234abcd`).
pub fn node_id_string(num: u32) -> String {
    format!("!{}", hex::encode(num.to_be_bytes()))
}

/// Parse `!1234abcd`, `0x1234abcd` or a decimal node number.
pub fn parse_node_id(s: &str) -> Option<u32> {
    let s = s.trim();
    let hex_digits = s.strip_prefix('!').or_else(|| s.strip_prefix("0x"));
    match hex_digits {
        Some(digits) => {
            let bytes = hex::decode(format!("{digits:0>8}")).ok()?;
            let arr: [u8; 4] = bytes.try_into().ok()?;
            Some(u32::from_be_bytes(arr))
        }
        None => s.parse().ok(),
    }
}
