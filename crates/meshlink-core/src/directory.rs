//! Node and channel directory, updated as a side effect of dispatch.
//!
//! Holds what the device told us during the config dump and afterwards: our
//! own node number and identity, the node database, channel slots, firmware
//! metadata, and a bounded log of text messages with their ack state.

use crate::ack::AckRecord;
use dashmap::DashMap;
use meshlink_proto::{
    Channel, DeviceMetadata, DeviceMetrics, MeshPacket, MyNodeInfo, NodeInfo, PKC_CHANNEL_INDEX,
    PortNum, User,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, RwLock};

/// Name of the channel reserved for remote administration.
pub const ADMIN_CHANNEL_NAME: &str = "admin";

/// Which way a logged message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from the mesh
    Inbound,
    /// Sent by this client
    Outbound,
}

/// A text message in the message log.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedMessage {
    /// Packet id
    pub id: u32,
    /// Sender node number
    pub from: u32,
    /// Destination node number
    pub to: u32,
    /// Channel index
    pub channel: u32,
    /// Message text
    pub text: String,
    /// Inbound or outbound
    pub direction: Direction,
    /// Node that acknowledged delivery, once an ack arrived
    pub acked_by: Option<u32>,
    /// Routing error reported instead of an ack
    pub error_code: Option<i32>,
}

/// Known nodes, channels and messages.
pub struct Directory {
    my_node_num: AtomicU32,
    my_user: RwLock<Option<User>>,
    my_metrics: RwLock<Option<DeviceMetrics>>,
    metadata: RwLock<Option<DeviceMetadata>>,
    nodes: DashMap<u32, NodeInfo>,
    channels: DashMap<u32, Channel>,
    messages: Mutex<VecDeque<LoggedMessage>>,
    message_capacity: usize,
}

impl Directory {
    /// Create an empty directory keeping at most `message_capacity` messages.
    #[must_use]
    pub fn new(message_capacity: usize) -> Self {
        Self {
            my_node_num: AtomicU32::new(0),
            my_user: RwLock::new(None),
            my_metrics: RwLock::new(None),
            metadata: RwLock::new(None),
            nodes: DashMap::new(),
            channels: DashMap::new(),
            messages: Mutex::new(VecDeque::new()),
            message_capacity: message_capacity.max(1),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Updates from dispatch
    // ═══════════════════════════════════════════════════════════════════════

    /// Record our own node number.
    pub fn apply_my_info(&self, info: &MyNodeInfo) {
        self.my_node_num.store(info.my_node_num, Ordering::SeqCst);
        tracing::info!("Attached node is {:08x}", info.my_node_num);

        // Node info may have arrived before our node number
        if let Some(node) = self.nodes.get(&info.my_node_num) {
            self.adopt_own_node(&node);
        }
    }

    /// Store a node database entry.
    pub fn apply_node_info(&self, info: &NodeInfo) {
        if info.num == self.my_node_num() && info.num != 0 {
            self.adopt_own_node(info);
        }
        tracing::trace!("Node info for {:08x}", info.num);
        self.nodes.insert(info.num, info.clone());
    }

    fn adopt_own_node(&self, info: &NodeInfo) {
        if let Some(user) = &info.user {
            *self.my_user.write().unwrap_or_else(|e| e.into_inner()) = Some(user.clone());
        }
        if let Some(metrics) = info.device_metrics {
            *self.my_metrics.write().unwrap_or_else(|e| e.into_inner()) = Some(metrics);
        }
    }

    /// Store a channel slot.
    pub fn apply_channel(&self, channel: &Channel) {
        let Ok(index) = u32::try_from(channel.index) else {
            tracing::warn!("Ignoring channel with negative index {}", channel.index);
            return;
        };
        self.channels.insert(index, channel.clone());
    }

    /// Store firmware metadata.
    pub fn apply_metadata(&self, metadata: &DeviceMetadata) {
        *self.metadata.write().unwrap_or_else(|e| e.into_inner()) = Some(metadata.clone());
    }

    /// Log an inbound text message. Returns false for non-text packets.
    pub fn apply_packet(&self, packet: &MeshPacket) -> bool {
        let Some(data) = packet.decoded() else {
            return false;
        };
        if data.portnum() != PortNum::TextMessageApp {
            return false;
        }
        self.log_message(LoggedMessage {
            id: packet.id,
            from: packet.from,
            to: packet.to,
            channel: packet.channel,
            text: String::from_utf8_lossy(&data.payload).into_owned(),
            direction: Direction::Inbound,
            acked_by: None,
            error_code: None,
        });
        true
    }

    /// Mark the logged message acked by `record`. Returns false if no
    /// message with that id is logged.
    ///
    /// `acked_by` and `error_code` are never both set. A clean ack clears an
    /// earlier routing error, and a routing error after a clean ack is
    /// ignored: once any node confirmed delivery the message stays delivered.
    pub fn apply_ack(&self, record: &AckRecord) -> bool {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let Some(message) = messages
            .iter_mut()
            .rev()
            .find(|m| m.id == record.correlation_id)
        else {
            return false;
        };
        if record.is_clean() {
            message.acked_by = Some(record.acking_node);
            message.error_code = None;
        } else if message.acked_by.is_none() {
            message.error_code = Some(record.error_code);
        }
        true
    }

    /// Append to the message log, evicting the oldest message when full.
    pub fn log_message(&self, message: LoggedMessage) {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        if messages.len() >= self.message_capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    /// Forget a node. Returns the removed entry.
    pub fn remove_node(&self, num: u32) -> Option<NodeInfo> {
        self.nodes.remove(&num).map(|(_, info)| info)
    }

    /// Update the favourite flag of a known node.
    pub fn set_favourite(&self, num: u32, favourite: bool) {
        if let Some(mut node) = self.nodes.get_mut(&num) {
            node.is_favorite = favourite;
        }
    }

    /// Replace our own identity.
    pub fn set_my_user(&self, user: User) {
        let num = self.my_node_num();
        if let Some(mut node) = self.nodes.get_mut(&num) {
            node.user = Some(user.clone());
        }
        *self.my_user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Our node number, 0 until the device announced it.
    pub fn my_node_num(&self) -> u32 {
        self.my_node_num.load(Ordering::SeqCst)
    }

    /// Our node number, if known.
    pub fn my_node(&self) -> Option<u32> {
        Some(self.my_node_num()).filter(|&num| num != 0)
    }

    /// Our own identity, once our node info arrived.
    pub fn my_user(&self) -> Option<User> {
        self.my_user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Our own device metrics, once reported.
    pub fn my_device_metrics(&self) -> Option<DeviceMetrics> {
        *self.my_metrics.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Firmware metadata of the attached device.
    pub fn metadata(&self) -> Option<DeviceMetadata> {
        self.metadata
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// A node database entry.
    pub fn node(&self, num: u32) -> Option<NodeInfo> {
        self.nodes.get(&num).map(|n| n.clone())
    }

    /// Every known node, sorted by node number.
    pub fn nodes(&self) -> Vec<NodeInfo> {
        let mut nodes: Vec<NodeInfo> = self.nodes.iter().map(|n| n.clone()).collect();
        nodes.sort_by_key(|n| n.num);
        nodes
    }

    /// A channel slot.
    pub fn channel(&self, index: u32) -> Option<Channel> {
        self.channels.get(&index).map(|c| c.clone())
    }

    /// Every known channel slot, sorted by index.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.channels.iter().map(|c| c.clone()).collect();
        channels.sort_by_key(|c| c.index);
        channels
    }

    /// Snapshot of the message log, oldest first.
    pub fn messages(&self) -> Vec<LoggedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// A node's public key, empty when unknown.
    pub fn public_key(&self, num: u32) -> Vec<u8> {
        self.nodes
            .get(&num)
            .and_then(|n| n.user.as_ref().map(|u| u.public_key.clone()))
            .unwrap_or_default()
    }

    /// Channel to reach `num` on: the channel it was heard on, else 0.
    pub fn node_channel(&self, num: u32) -> u32 {
        self.nodes.get(&num).map_or(0, |n| n.channel)
    }

    /// Channel for admin traffic to `num`.
    ///
    /// A channel named "admin" wins; otherwise nodes with a known public key
    /// are reached over PKI, and everything else over the primary channel.
    pub fn admin_channel(&self, num: u32) -> u32 {
        let named = self
            .channels
            .iter()
            .filter(|c| c.is_enabled() && c.name().eq_ignore_ascii_case(ADMIN_CHANNEL_NAME))
            .map(|c| *c.key())
            .min();
        if let Some(index) = named {
            return index;
        }
        if !self.public_key(num).is_empty() {
            return PKC_CHANNEL_INDEX;
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlink_proto::{ChannelSettings, Data, channel, mesh_packet};
    use proptest::prelude::*;
    use tokio::time::Instant;

    fn node(num: u32, channel: u32, public_key: Vec<u8>) -> NodeInfo {
        NodeInfo {
            num,
            channel,
            user: Some(User {
                id: meshlink_proto::node_id_string(num),
                long_name: format!("Node {num}"),
                public_key,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn named_channel(index: i32, name: &str) -> Channel {
        Channel {
            index,
            role: channel::Role::Secondary as i32,
            settings: Some(ChannelSettings {
                name: name.to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_own_user_from_node_info() {
        let dir = Directory::new(10);
        dir.apply_my_info(&MyNodeInfo {
            my_node_num: 1,
            ..Default::default()
        });
        dir.apply_node_info(&node(1, 0, vec![]));
        dir.apply_node_info(&node(2, 0, vec![]));
        assert_eq!(dir.my_user().unwrap().long_name, "Node 1");
        assert_eq!(dir.nodes().len(), 2);
    }

    #[test]
    fn test_own_user_when_node_info_came_first() {
        let dir = Directory::new(10);
        dir.apply_node_info(&node(1, 0, vec![]));
        assert!(dir.my_user().is_none());
        dir.apply_my_info(&MyNodeInfo {
            my_node_num: 1,
            ..Default::default()
        });
        assert!(dir.my_user().is_some());
        assert_eq!(dir.my_node(), Some(1));
    }

    #[test]
    fn test_node_channel_defaults_to_zero() {
        let dir = Directory::new(10);
        dir.apply_node_info(&node(5, 2, vec![]));
        assert_eq!(dir.node_channel(5), 2);
        assert_eq!(dir.node_channel(6), 0);
    }

    #[test]
    fn test_admin_channel_selection() {
        let dir = Directory::new(10);
        dir.apply_node_info(&node(5, 0, vec![7; 32]));
        dir.apply_node_info(&node(6, 0, vec![]));

        // PKI for nodes with a key, primary otherwise
        assert_eq!(dir.admin_channel(5), PKC_CHANNEL_INDEX);
        assert_eq!(dir.admin_channel(6), 0);

        // A named admin channel wins
        dir.apply_channel(&named_channel(3, "Admin"));
        assert_eq!(dir.admin_channel(5), 3);
        assert_eq!(dir.admin_channel(6), 3);
    }

    #[test]
    fn test_remove_node() {
        let dir = Directory::new(10);
        dir.apply_node_info(&node(5, 0, vec![]));
        assert!(dir.remove_node(5).is_some());
        assert!(dir.node(5).is_none());
        assert!(dir.remove_node(5).is_none());
    }

    #[test]
    fn test_message_log_and_ack() {
        let dir = Directory::new(2);
        let text = |id: u32, body: &str| MeshPacket {
            id,
            from: 9,
            to: 1,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                portnum: PortNum::TextMessageApp as i32,
                payload: body.as_bytes().to_vec(),
                ..Default::default()
            })),
            ..Default::default()
        };

        assert!(dir.apply_packet(&text(1, "one")));
        assert!(dir.apply_packet(&text(2, "two")));
        assert!(dir.apply_packet(&text(3, "three")));
        let messages = dir.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "two");

        let ack = AckRecord {
            correlation_id: 3,
            acking_node: 9,
            hops_away: 0,
            error_code: 0,
            received_at: Instant::now(),
        };
        assert!(dir.apply_ack(&ack));
        assert_eq!(dir.messages()[1].acked_by, Some(9));
        assert!(!dir.apply_ack(&AckRecord {
            correlation_id: 1,
            ..ack
        }));
    }

    fn outbound(id: u32) -> LoggedMessage {
        LoggedMessage {
            id,
            from: 1,
            to: 9,
            channel: 0,
            text: "ping".to_string(),
            direction: Direction::Outbound,
            acked_by: None,
            error_code: None,
        }
    }

    fn ack_from(id: u32, node: u32, error_code: i32) -> AckRecord {
        AckRecord {
            correlation_id: id,
            acking_node: node,
            hops_away: 0,
            error_code,
            received_at: Instant::now(),
        }
    }

    #[test]
    fn test_clean_ack_clears_routing_error() {
        let dir = Directory::new(4);
        dir.log_message(outbound(7));

        assert!(dir.apply_ack(&ack_from(7, 3, 5)));
        assert_eq!(dir.messages()[0].error_code, Some(5));
        assert_eq!(dir.messages()[0].acked_by, None);

        assert!(dir.apply_ack(&ack_from(7, 9, 0)));
        let message = &dir.messages()[0];
        assert_eq!(message.acked_by, Some(9));
        assert_eq!(message.error_code, None);
    }

    #[test]
    fn test_routing_error_after_ack_ignored() {
        let dir = Directory::new(4);
        dir.log_message(outbound(7));

        assert!(dir.apply_ack(&ack_from(7, 9, 0)));
        assert!(dir.apply_ack(&ack_from(7, 3, 5)));
        let message = &dir.messages()[0];
        assert_eq!(message.acked_by, Some(9));
        assert_eq!(message.error_code, None);
    }

    proptest! {
        #[test]
        fn prop_ack_state_exclusive(
            records in prop::collection::vec((1u32..6, prop_oneof![Just(0i32), 1i32..40]), 0..20),
        ) {
            let dir = Directory::new(4);
            dir.log_message(outbound(7));
            for (node, code) in &records {
                dir.apply_ack(&ack_from(7, *node, *code));
            }

            let message = &dir.messages()[0];
            prop_assert!(message.acked_by.is_none() || message.error_code.is_none());
            match records.iter().rev().find(|(_, code)| *code == 0) {
                Some((node, _)) => prop_assert_eq!(message.acked_by, Some(*node)),
                None => prop_assert_eq!(message.error_code, records.last().map(|(_, code)| *code)),
            }
        }
    }

    #[test]
    fn test_negative_channel_index_ignored() {
        let dir = Directory::new(1);
        dir.apply_channel(&named_channel(-1, "bad"));
        assert!(dir.channels().is_empty());
    }
}
