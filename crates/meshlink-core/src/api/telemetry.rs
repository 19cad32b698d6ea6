//! Device metrics exchange.

use super::{decode_reply, unix_time};
use crate::correlator::ResponseKind;
use crate::error::{RequestError, Result};
use crate::session::{OutboundPacket, Session};
use meshlink_proto::telemetry::telemetry::Variant;
use meshlink_proto::{DeviceMetrics, PortNum, Telemetry, encode};

impl Session {
    /// Send our device metrics to `node` and return theirs.
    ///
    /// # Errors
    /// `UnexpectedResponse` when the node replies with a different telemetry
    /// variant, otherwise any [`RequestError`].
    pub async fn request_device_metrics(&self, node: u32) -> Result<DeviceMetrics> {
        let ours = self.directory().my_device_metrics().unwrap_or_default();
        let payload = encode(&Telemetry::device(unix_time(), ours));
        let packet = OutboundPacket::new(node, PortNum::TelemetryApp, payload)
            .on_channel(self.directory().node_channel(node))
            .want_ack()
            .want_response()
            .named("request_device_metrics");

        let reply = self
            .request(packet, ResponseKind::Response, self.config().request_timeout)
            .await?;
        let telemetry: Telemetry = decode_reply(&reply)?;
        match telemetry.variant {
            Some(Variant::DeviceMetrics(metrics)) => Ok(metrics),
            _ => Err(RequestError::unexpected(
                "device_metrics",
                telemetry.variant_name(),
            )),
        }
    }
}
