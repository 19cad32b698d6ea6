//! Traceroute.

use super::decode_reply;
use crate::correlator::ResponseKind;
use crate::error::Result;
use crate::session::{OutboundPacket, Session};
use meshlink_proto::{PortNum, RouteDiscovery, encode};
use std::time::Duration;

impl Session {
    /// Discover the route to `node` and back.
    ///
    /// Relays append themselves to the record on the way, so the reply lists
    /// the hops in both directions.
    pub async fn trace_route(&self, node: u32, timeout: Option<Duration>) -> Result<RouteDiscovery> {
        let packet = OutboundPacket::new(node, PortNum::TracerouteApp, encode(&RouteDiscovery::default()))
            .on_channel(self.directory().node_channel(node))
            .want_ack()
            .want_response()
            .named("trace_route");
        let timeout = timeout.unwrap_or(self.config().request_timeout);
        let reply = self.request(packet, ResponseKind::Response, timeout).await?;
        decode_reply(&reply)
    }
}
