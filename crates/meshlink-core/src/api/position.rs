//! Position requests.

use super::decode_reply;
use crate::correlator::ResponseKind;
use crate::error::Result;
use crate::session::{OutboundPacket, Session};
use meshlink_proto::{PortNum, Position, encode};

impl Session {
    /// Ask `node` for its position.
    ///
    /// An empty position is sent so the node does not learn ours.
    pub async fn request_position(&self, node: u32) -> Result<Position> {
        let packet = OutboundPacket::new(node, PortNum::PositionApp, encode(&Position::default()))
            .on_channel(self.directory().node_channel(node))
            .want_ack()
            .want_response()
            .named("request_position");
        let reply = self
            .request(packet, ResponseKind::Response, self.config().request_timeout)
            .await?;
        decode_reply(&reply)
    }
}
