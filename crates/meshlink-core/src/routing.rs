//! Routing-error classification.
//!
//! Replies on `ROUTING_APP` are either plain delivery acks (`error_reason`
//! absent or `NONE`) or protocol-level rejections. Everything on another port
//! is an application reply.

use crate::error::{RequestError, RoutingError};
use meshlink_proto::{MeshPacket, PortNum, Routing, decode_as};

/// How a packet that answers a request should be treated.
#[derive(Debug, Clone)]
pub enum Classification {
    /// An application-level reply
    Reply,
    /// A routing reply without error: delivery acknowledgment only
    Ack,
    /// A routing reply carrying an error, or one that failed to decode
    Rejected(RequestError),
}

impl Classification {
    /// Returns true for clean routing acks.
    pub const fn is_ack(&self) -> bool {
        matches!(self, Classification::Ack)
    }
}

/// Classify a packet that carries a decoded payload.
///
/// Packets without a decoded payload are treated as application replies;
/// callers only classify packets that already matched a request id.
pub fn classify(packet: &MeshPacket) -> Classification {
    let Some(data) = packet.decoded() else {
        return Classification::Reply;
    };
    if data.portnum() != PortNum::RoutingApp {
        return Classification::Reply;
    }
    match decode_as::<Routing>(&data.payload) {
        Ok(routing) => match routing.error_reason() {
            Some(code) if code != 0 => Classification::Rejected(RequestError::Routing(
                RoutingError::from_code(code),
            )),
            _ => Classification::Ack,
        },
        Err(e) => Classification::Rejected(e.into()),
    }
}

/// Ack details carried by a routing packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckInfo {
    /// Id of the acknowledged packet
    pub request_id: u32,
    /// Node that sent the ack
    pub from: u32,
    /// Hops the ack travelled (0 when unknown)
    pub hops_away: u32,
    /// Routing error code (0 for a clean ack)
    pub error_code: i32,
}

/// Extract ack details from a routing packet. Returns `None` for packets on
/// other ports and routing packets that do not reference a request.
pub fn ack_info(packet: &MeshPacket) -> Option<AckInfo> {
    let data = packet.decoded()?;
    if data.portnum() != PortNum::RoutingApp || data.request_id == 0 {
        return None;
    }
    let error_code = match decode_as::<Routing>(&data.payload) {
        Ok(routing) => routing.error_reason().unwrap_or(0),
        Err(e) => {
            tracing::warn!(
                "Undecodable routing payload from {:08x} for packet {}: {}",
                packet.from,
                data.request_id,
                e
            );
            0
        }
    };
    Some(AckInfo {
        request_id: data.request_id,
        from: packet.from,
        hops_away: packet.hops_away().unwrap_or(0),
        error_code,
    })
}
