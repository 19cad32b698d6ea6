//! Channel definitions.

/// Channel parameters shared by every node on the channel.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChannelSettings {
    /// Deprecated channel number
    #[prost(uint32, tag = "1")]
    pub channel_num: u32,
    /// Pre-shared key (0, 1, 16 or 32 bytes)
    #[prost(bytes = "vec", tag = "2")]
    pub psk: Vec<u8>,
    /// Channel name (at most 11 characters)
    #[prost(string, tag = "3")]
    pub name: String,
    /// Channel id hint
    #[prost(fixed32, tag = "4")]
    pub id: u32,
    /// Forward mesh traffic to MQTT
    #[prost(bool, tag = "5")]
    pub uplink_enabled: bool,
    /// Forward MQTT traffic to the mesh
    #[prost(bool, tag = "6")]
    pub downlink_enabled: bool,
}

/// A channel slot on the device.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Channel {
    /// Slot index (0..8)
    #[prost(int32, tag = "1")]
    pub index: i32,
    /// Channel parameters
    #[prost(message, optional, tag = "2")]
    pub settings: Option<ChannelSettings>,
    /// Slot role
    #[prost(enumeration = "channel::Role", tag = "3")]
    pub role: i32,
}

pub use self::channel::Role;

/// Nested types for [`Channel`].
pub mod channel {
    /// How the slot is used
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Role {
        /// Unused slot
        Disabled = 0,
        /// Primary channel
        Primary = 1,
        /// Secondary channel
        Secondary = 2,
    }
}

impl Channel {
    /// Channel name, empty when the slot carries no settings.
    pub fn name(&self) -> &str {
        self.settings.as_ref().map_or("", |s| s.name.as_str())
    }

    /// Whether the slot is in use.
    pub fn is_enabled(&self) -> bool {
        self.role() != channel::Role::Disabled
    }
}
