//! Text messages.

use crate::directory::{Direction, LoggedMessage};
use crate::error::Result;
use crate::packet_id::CorrelationId;
use crate::session::{OutboundPacket, Session};
use meshlink_proto::PortNum;

impl Session {
    /// Send `text` to `destination` (a node or the broadcast address) on
    /// `channel`. Returns the packet id.
    ///
    /// The message is logged; its `acked_by` is filled in when the ack
    /// arrives.
    pub async fn send_text(&self, destination: u32, channel: u32, text: &str) -> Result<CorrelationId> {
        let packet = OutboundPacket::new(destination, PortNum::TextMessageApp, text.as_bytes().to_vec())
            .on_channel(channel)
            .want_ack()
            .named("send_text");
        let id = self.send_packet(packet).await?;
        self.directory().log_message(LoggedMessage {
            id,
            from: self.directory().my_node_num(),
            to: destination,
            channel,
            text: text.to_string(),
            direction: Direction::Outbound,
            acked_by: None,
            error_code: None,
        });
        // Acks that arrived while the send was in flight found nothing logged
        for record in self.acks().acks_for(id) {
            self.directory().apply_ack(&record);
        }
        Ok(id)
    }
}
