//! Remote administration messages carried on `ADMIN_APP`.

use crate::channel::Channel;
use crate::mesh::{DeviceMetadata, Position, User};

/// LoRa radio configuration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LoRaConfig {
    /// Use the modem preset instead of explicit bandwidth/SF/CR
    #[prost(bool, tag = "1")]
    pub use_preset: bool,
    /// Modem preset
    #[prost(int32, tag = "2")]
    pub modem_preset: i32,
    /// Bandwidth in kHz
    #[prost(uint32, tag = "3")]
    pub bandwidth: u32,
    /// Spreading factor
    #[prost(uint32, tag = "4")]
    pub spread_factor: u32,
    /// Coding rate denominator
    #[prost(uint32, tag = "5")]
    pub coding_rate: u32,
    /// Frequency offset in MHz
    #[prost(float, tag = "6")]
    pub frequency_offset: f32,
    /// Regulatory region
    #[prost(int32, tag = "7")]
    pub region: i32,
    /// Default hop limit for originated packets
    #[prost(uint32, tag = "8")]
    pub hop_limit: u32,
    /// Transmitter enabled
    #[prost(bool, tag = "9")]
    pub tx_enabled: bool,
    /// Transmit power in dBm
    #[prost(int32, tag = "10")]
    pub tx_power: i32,
    /// Frequency slot
    #[prost(uint32, tag = "11")]
    pub channel_num: u32,
}

/// Device configuration section.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Config {
    /// Section payload
    #[prost(oneof = "config::PayloadVariant", tags = "6")]
    pub payload_variant: Option<config::PayloadVariant>,
}

/// Nested types for [`Config`].
pub mod config {
    /// Configuration section payload
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// LoRa section
        #[prost(message, tag = "6")]
        Lora(super::LoRaConfig),
    }
}

/// Administrative request or response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AdminMessage {
    /// Request or response payload
    #[prost(
        oneof = "admin_message::PayloadVariant",
        tags = "1, 2, 3, 4, 5, 6, 12, 13, 22, 32, 33, 34, 38, 39, 40, 41, 42, 43, 97, 98, 100"
    )]
    pub payload_variant: Option<admin_message::PayloadVariant>,
}

/// Nested types for [`AdminMessage`].
pub mod admin_message {
    /// Configuration sections that can be requested
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ConfigType {
        /// Device section
        DeviceConfig = 0,
        /// Position section
        PositionConfig = 1,
        /// Power section
        PowerConfig = 2,
        /// Network section
        NetworkConfig = 3,
        /// Display section
        DisplayConfig = 4,
        /// LoRa section
        LoraConfig = 5,
        /// Bluetooth section
        BluetoothConfig = 6,
        /// Security section
        SecurityConfig = 7,
        /// Session key
        SessionkeyConfig = 8,
    }

    /// Admin payload
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum PayloadVariant {
        /// Ask for channel `index + 1`
        #[prost(uint32, tag = "1")]
        GetChannelRequest(u32),
        /// Channel reply
        #[prost(message, tag = "2")]
        GetChannelResponse(super::Channel),
        /// Ask for the owner
        #[prost(bool, tag = "3")]
        GetOwnerRequest(bool),
        /// Owner reply
        #[prost(message, tag = "4")]
        GetOwnerResponse(super::User),
        /// Ask for a config section
        #[prost(enumeration = "ConfigType", tag = "5")]
        GetConfigRequest(i32),
        /// Config section reply
        #[prost(message, tag = "6")]
        GetConfigResponse(super::Config),
        /// Ask for firmware metadata
        #[prost(bool, tag = "12")]
        GetDeviceMetadataRequest(bool),
        /// Firmware metadata reply
        #[prost(message, tag = "13")]
        GetDeviceMetadataResponse(super::DeviceMetadata),
        /// Delete a file on the device
        #[prost(string, tag = "22")]
        DeleteFileRequest(String),
        /// Set the owner
        #[prost(message, tag = "32")]
        SetOwner(super::User),
        /// Replace a channel slot
        #[prost(message, tag = "33")]
        SetChannel(super::Channel),
        /// Replace a config section
        #[prost(message, tag = "34")]
        SetConfig(super::Config),
        /// Drop a node from the node database
        #[prost(uint32, tag = "38")]
        RemoveByNodenum(u32),
        /// Mark a node as favourite
        #[prost(uint32, tag = "39")]
        SetFavoriteNode(u32),
        /// Unmark a favourite node
        #[prost(uint32, tag = "40")]
        RemoveFavoriteNode(u32),
        /// Pin the node's position
        #[prost(message, tag = "41")]
        SetFixedPosition(super::Position),
        /// Unpin the node's position
        #[prost(bool, tag = "42")]
        RemoveFixedPosition(bool),
        /// Set the clock (seconds since epoch)
        #[prost(fixed32, tag = "43")]
        SetTimeOnly(u32),
        /// Reboot after this many seconds
        #[prost(int32, tag = "97")]
        RebootSeconds(i32),
        /// Shut down after this many seconds
        #[prost(int32, tag = "98")]
        ShutdownSeconds(i32),
        /// Clear the node database
        #[prost(int32, tag = "100")]
        NodedbReset(i32),
    }
}

impl AdminMessage {
    /// Wrap a payload variant.
    pub fn new(variant: admin_message::PayloadVariant) -> Self {
        Self {
            payload_variant: Some(variant),
        }
    }

    /// Short name of the carried variant, for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        use admin_message::PayloadVariant as V;
        match &self.payload_variant {
            None => "none",
            Some(V::GetChannelRequest(_)) => "get_channel_request",
            Some(V::GetChannelResponse(_)) => "get_channel_response",
            Some(V::GetOwnerRequest(_)) => "get_owner_request",
            Some(V::GetOwnerResponse(_)) => "get_owner_response",
            Some(V::GetConfigRequest(_)) => "get_config_request",
            Some(V::GetConfigResponse(_)) => "get_config_response",
            Some(V::GetDeviceMetadataRequest(_)) => "get_device_metadata_request",
            Some(V::GetDeviceMetadataResponse(_)) => "get_device_metadata_response",
            Some(V::DeleteFileRequest(_)) => "delete_file_request",
            Some(V::SetOwner(_)) => "set_owner",
            Some(V::SetChannel(_)) => "set_channel",
            Some(V::SetConfig(_)) => "set_config",
            Some(V::RemoveByNodenum(_)) => "remove_by_nodenum",
            Some(V::SetFavoriteNode(_)) => "set_favorite_node",
            Some(V::RemoveFavoriteNode(_)) => "remove_favorite_node",
            Some(V::SetFixedPosition(_)) => "set_fixed_position",
            Some(V::RemoveFixedPosition(_)) => "remove_fixed_position",
            Some(V::SetTimeOnly(_)) => "set_time_only",
            Some(V::RebootSeconds(_)) => "reboot_seconds",
            Some(V::ShutdownSeconds(_)) => "shutdown_seconds",
            Some(V::NodedbReset(_)) => "nodedb_reset",
        }
    }
}
