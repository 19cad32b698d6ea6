//! Typed view of inbound device records.

use meshlink_proto::{
    Channel, Data, DeviceMetadata, FromRadio, MeshPacket, MyNodeInfo, NodeInfo, from_radio,
    mesh_packet,
};

/// Device-level status notices.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceStatus {
    /// The device rebooted
    Rebooted,
    /// Firmware metadata announced during the config dump
    Metadata(DeviceMetadata),
}

/// A decoded inbound record, tagged by what it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    /// A mesh packet
    Packet(MeshPacket),
    /// A node database entry
    NodeInfo(NodeInfo),
    /// A channel slot
    Channel(Channel),
    /// The attached node's own info
    MyNodeInfo(MyNodeInfo),
    /// Reboot or metadata notice
    DeviceStatus(DeviceStatus),
    /// End of a config dump
    ConfigComplete(u32),
    /// A record with no payload the client understands
    Other(FromRadio),
}

/// Subscriber categories, one per envelope variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// [`InboundEnvelope::Packet`]
    Packet,
    /// [`InboundEnvelope::NodeInfo`]
    NodeInfo,
    /// [`InboundEnvelope::Channel`]
    Channel,
    /// [`InboundEnvelope::MyNodeInfo`]
    MyNodeInfo,
    /// [`InboundEnvelope::DeviceStatus`]
    DeviceStatus,
    /// [`InboundEnvelope::ConfigComplete`]
    ConfigComplete,
    /// [`InboundEnvelope::Other`]
    Other,
}

impl Category {
    /// Number of categories.
    pub const COUNT: usize = 7;

    /// Every category.
    pub const ALL: [Category; Self::COUNT] = [
        Category::Packet,
        Category::NodeInfo,
        Category::Channel,
        Category::MyNodeInfo,
        Category::DeviceStatus,
        Category::ConfigComplete,
        Category::Other,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }
}

impl From<FromRadio> for InboundEnvelope {
    fn from(record: FromRadio) -> Self {
        use from_radio::PayloadVariant as V;
        match record.payload_variant {
            Some(V::Packet(packet)) => InboundEnvelope::Packet(packet),
            Some(V::NodeInfo(info)) => InboundEnvelope::NodeInfo(info),
            Some(V::Channel(channel)) => InboundEnvelope::Channel(channel),
            Some(V::MyInfo(info)) => InboundEnvelope::MyNodeInfo(info),
            Some(V::Rebooted(_)) => InboundEnvelope::DeviceStatus(DeviceStatus::Rebooted),
            Some(V::Metadata(meta)) => InboundEnvelope::DeviceStatus(DeviceStatus::Metadata(meta)),
            Some(V::ConfigCompleteId(id)) => InboundEnvelope::ConfigComplete(id),
            None => InboundEnvelope::Other(record),
        }
    }
}

impl InboundEnvelope {
    /// Category used to select subscribers.
    pub const fn category(&self) -> Category {
        match self {
            InboundEnvelope::Packet(_) => Category::Packet,
            InboundEnvelope::NodeInfo(_) => Category::NodeInfo,
            InboundEnvelope::Channel(_) => Category::Channel,
            InboundEnvelope::MyNodeInfo(_) => Category::MyNodeInfo,
            InboundEnvelope::DeviceStatus(_) => Category::DeviceStatus,
            InboundEnvelope::ConfigComplete(_) => Category::ConfigComplete,
            InboundEnvelope::Other(_) => Category::Other,
        }
    }

    /// The packet, for packet envelopes.
    pub fn packet(&self) -> Option<&MeshPacket> {
        match self {
            InboundEnvelope::Packet(packet) => Some(packet),
            _ => None,
        }
    }
}

/// Decoded or opaque view of a packet's payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacketPayload<'a> {
    /// Application payload
    Decoded(&'a Data),
    /// Payload the device could not decrypt
    Encrypted(&'a [u8]),
    /// Packet without payload
    Empty,
}

/// Classify a packet's payload.
pub fn payload_of(packet: &MeshPacket) -> PacketPayload<'_> {
    match &packet.payload_variant {
        Some(mesh_packet::PayloadVariant::Decoded(data)) => PacketPayload::Decoded(data),
        Some(mesh_packet::PayloadVariant::Encrypted(bytes)) => PacketPayload::Encrypted(bytes),
        None => PacketPayload::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_radio_mapping() {
        let record = FromRadio {
            id: 1,
            payload_variant: Some(from_radio::PayloadVariant::ConfigCompleteId(42)),
        };
        let envelope = InboundEnvelope::from(record);
        assert_eq!(envelope, InboundEnvelope::ConfigComplete(42));
        assert_eq!(envelope.category(), Category::ConfigComplete);

        let empty = InboundEnvelope::from(FromRadio::default());
        assert_eq!(empty.category(), Category::Other);

        let rebooted = InboundEnvelope::from(FromRadio {
            id: 2,
            payload_variant: Some(from_radio::PayloadVariant::Rebooted(true)),
        });
        assert_eq!(rebooted, InboundEnvelope::DeviceStatus(DeviceStatus::Rebooted));
    }

    #[test]
    fn test_category_indices_are_dense() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_payload_of() {
        let mut packet = MeshPacket::default();
        assert_eq!(payload_of(&packet), PacketPayload::Empty);

        packet.payload_variant = Some(mesh_packet::PayloadVariant::Encrypted(vec![1, 2]));
        assert_eq!(payload_of(&packet), PacketPayload::Encrypted(&[1, 2]));
    }
}
