//! Request builders.
//!
//! Each builder encodes one application message, hands it to the session and
//! decodes the correlated reply. None of them hold state of their own.

pub mod admin;
pub mod file_transfer;
pub mod node_info;
pub mod ping;
pub mod position;
pub mod telemetry;
pub mod text;
pub mod traceroute;

pub use admin::AdminApi;
pub use file_transfer::FileTransferApi;
pub use ping::PingResult;

use crate::error::{RequestError, Result};
use meshlink_proto::{MeshPacket, WireMessage, decode_as};

/// Decode the application payload of a reply.
pub(crate) fn decode_reply<M: WireMessage>(packet: &MeshPacket) -> Result<M> {
    let data = packet.decoded().ok_or_else(|| {
        RequestError::Decode(format!("reply {} carries no decoded payload", packet.id).into())
    })?;
    Ok(decode_as::<M>(&data.payload)?)
}

/// Seconds since the Unix epoch, as devices keep time.
pub(crate) fn unix_time() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
}
