//! Ping over delivery acks.
//!
//! A ping is an empty private-app packet that asks for an ack and no reply.
//! It never registers a correlator waiter: the destination's routing ack is
//! picked up from the ack log, which records it whether or not anyone waits.

use crate::error::{RequestError, Result, RoutingError};
use crate::session::{OutboundPacket, Session};
use meshlink_proto::PortNum;
use std::time::Duration;
use tokio::time::Instant;

/// Round trip of a ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResult {
    /// Time from send to ack
    pub duration_millis: u64,
    /// Hops the ack travelled
    pub hops_away: u32,
}

impl Session {
    /// Ping `node` and wait for its ack. `None` uses the session's ping
    /// deadline.
    ///
    /// # Errors
    /// `Timeout` when no ack from `node` arrives in time, `Routing` when
    /// `node` answers with a routing error.
    pub async fn ping(&self, node: u32, timeout: Option<Duration>) -> Result<PingResult> {
        let timeout = timeout.unwrap_or(self.config().ping_timeout);
        let packet = OutboundPacket::new(node, PortNum::PrivateApp, Vec::new())
            .on_channel(self.directory().node_channel(node))
            .want_ack()
            .named("ping");

        let started = Instant::now();
        let id = self.send_packet(packet).await?;
        let record = self
            .acks()
            .wait_for_ack(id, node, timeout.saturating_sub(started.elapsed()))
            .await
            .map_err(|e| match e {
                RequestError::Timeout { .. } => RequestError::timeout("ping"),
                other => other,
            })?;

        if !record.is_clean() {
            return Err(RequestError::Routing(RoutingError::from_code(record.error_code)));
        }

        let elapsed = record.received_at.saturating_duration_since(started);
        let result = PingResult {
            duration_millis: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            hops_away: record.hops_away,
        };
        tracing::debug!(
            "Ping {:08x}: {} ms, {} hops",
            node,
            result.duration_millis,
            result.hops_away
        );
        Ok(result)
    }
}
