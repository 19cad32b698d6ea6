//! Node info exchange.

use super::decode_reply;
use crate::correlator::ResponseKind;
use crate::error::{RequestError, Result};
use crate::session::{OutboundPacket, Session};
use meshlink_proto::{PortNum, User, encode};

impl Session {
    /// Send our `User` to `node` and return the one it answers with.
    ///
    /// # Errors
    /// `InvalidState` until our own node info has been received.
    pub async fn request_node_info(&self, node: u32) -> Result<User> {
        let me = self
            .directory()
            .my_user()
            .ok_or(RequestError::invalid_state("own node info unknown"))?;
        let packet = OutboundPacket::new(node, PortNum::NodeinfoApp, encode(&me))
            .on_channel(self.directory().node_channel(node))
            .want_ack()
            .want_response()
            .named("request_node_info");
        let reply = self
            .request(packet, ResponseKind::Response, self.config().request_timeout)
            .await?;
        decode_reply(&reply)
    }
}
