//! Remote and local administration.
//!
//! Remote calls travel on the node's admin channel (see
//! [`Directory::admin_channel`](crate::directory::Directory::admin_channel))
//! and always ask for an ack. Getters wait for the matching `*_response`
//! variant; setters complete on the destination's routing ack.
//!
//! Local calls address our own node on the primary channel and do not wait.

use super::{decode_reply, unix_time};
use crate::correlator::ResponseKind;
use crate::error::{RequestError, Result};
use crate::packet_id::CorrelationId;
use crate::session::{OutboundPacket, Session};
use meshlink_proto::admin::config;
use meshlink_proto::admin_message::{ConfigType, PayloadVariant as Admin};
use meshlink_proto::{AdminMessage, Channel, DeviceMetadata, LoRaConfig, PortNum, User, encode};
use std::time::Duration;

/// Seconds a remote reboot is delayed by.
pub const REBOOT_DELAY_SECS: i32 = 5;

/// Admin requests issued through a [`Session`].
#[derive(Clone, Copy)]
pub struct AdminApi<'a> {
    session: &'a Session,
    timeout: Duration,
}

impl Session {
    /// Admin requests with the session's default deadline.
    pub fn admin(&self) -> AdminApi<'_> {
        AdminApi {
            session: self,
            timeout: self.config().request_timeout,
        }
    }
}

impl<'a> AdminApi<'a> {
    /// Use `timeout` instead of the session default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call(&self, node: u32, message: AdminMessage, want_response: bool) -> Result<AdminMessage> {
        let channel = self.session.directory().admin_channel(node);
        let mut packet = OutboundPacket::new(node, PortNum::AdminApp, encode(&message))
            .on_channel(channel)
            .want_ack()
            .named(message.variant_name());
        let kind = if want_response {
            packet = packet.want_response();
            ResponseKind::Response
        } else {
            ResponseKind::Ack
        };

        let reply = self.session.request(packet, kind, self.timeout).await?;
        if want_response {
            decode_reply::<AdminMessage>(&reply)
        } else {
            Ok(AdminMessage::default())
        }
    }

    /// Owner of `node`.
    ///
    /// # Errors
    /// Any [`RequestError`]; `UnexpectedResponse` if the node answers with
    /// something other than its owner.
    pub async fn get_owner(&self, node: u32) -> Result<User> {
        let reply = self
            .call(node, AdminMessage::new(Admin::GetOwnerRequest(true)), true)
            .await?;
        match reply.payload_variant {
            Some(Admin::GetOwnerResponse(user)) => Ok(user),
            _ => Err(RequestError::unexpected("get_owner_response", reply.variant_name())),
        }
    }

    /// Replace the owner of `node`.
    pub async fn set_owner(&self, node: u32, user: User) -> Result<()> {
        self.call(node, AdminMessage::new(Admin::SetOwner(user.clone())), false)
            .await?;
        if Some(node) == self.session.directory().my_node() {
            self.session.directory().set_my_user(user);
        }
        Ok(())
    }

    /// Channel slot `index` (0-based) of `node`.
    pub async fn get_channel(&self, node: u32, index: u32) -> Result<Channel> {
        // Devices number channel requests from 1
        let request = AdminMessage::new(Admin::GetChannelRequest(index.saturating_add(1)));
        let reply = self.call(node, request, true).await?;
        match reply.payload_variant {
            Some(Admin::GetChannelResponse(channel)) => Ok(channel),
            _ => Err(RequestError::unexpected("get_channel_response", reply.variant_name())),
        }
    }

    /// Replace a channel slot on `node`.
    pub async fn set_channel(&self, node: u32, channel: Channel) -> Result<()> {
        self.call(node, AdminMessage::new(Admin::SetChannel(channel)), false)
            .await
            .map(drop)
    }

    /// LoRa radio settings of `node`.
    pub async fn get_lora_config(&self, node: u32) -> Result<LoRaConfig> {
        let request = AdminMessage::new(Admin::GetConfigRequest(ConfigType::LoraConfig as i32));
        let reply = self.call(node, request, true).await?;
        match reply.payload_variant {
            Some(Admin::GetConfigResponse(cfg)) => match cfg.payload_variant {
                Some(config::PayloadVariant::Lora(lora)) => Ok(lora),
                None => Err(RequestError::unexpected("lora", "empty config")),
            },
            _ => Err(RequestError::unexpected("get_config_response", reply.variant_name())),
        }
    }

    /// Firmware metadata of `node`.
    pub async fn get_device_metadata(&self, node: u32) -> Result<DeviceMetadata> {
        let request = AdminMessage::new(Admin::GetDeviceMetadataRequest(true));
        let reply = self.call(node, request, true).await?;
        match reply.payload_variant {
            Some(Admin::GetDeviceMetadataResponse(meta)) => Ok(meta),
            _ => Err(RequestError::unexpected(
                "get_device_metadata_response",
                reply.variant_name(),
            )),
        }
    }

    /// Reboot `node` after [`REBOOT_DELAY_SECS`].
    pub async fn reboot(&self, node: u32) -> Result<()> {
        self.call(node, AdminMessage::new(Admin::RebootSeconds(REBOOT_DELAY_SECS)), false)
            .await
            .map(drop)
    }

    /// Clear the node database of `node`.
    pub async fn reset_nodedb(&self, node: u32) -> Result<()> {
        self.call(node, AdminMessage::new(Admin::NodedbReset(1)), false)
            .await
            .map(drop)
    }

    /// Delete a file on `node`.
    pub async fn delete_file(&self, node: u32, file_name: impl Into<String>) -> Result<()> {
        self.call(node, AdminMessage::new(Admin::DeleteFileRequest(file_name.into())), false)
            .await
            .map(drop)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Local node
    // ═══════════════════════════════════════════════════════════════════════

    async fn local(&self, message: AdminMessage) -> Result<CorrelationId> {
        let me = self
            .session
            .directory()
            .my_node()
            .ok_or(RequestError::invalid_state("own node number unknown"))?;
        let packet = OutboundPacket::new(me, PortNum::AdminApp, encode(&message))
            .want_ack()
            .named(message.variant_name());
        self.session.send_packet(packet).await
    }

    /// Set the attached device's clock. `None` uses the current time.
    pub async fn set_time(&self, unix_seconds: Option<u32>) -> Result<CorrelationId> {
        let time = unix_seconds.unwrap_or_else(unix_time);
        self.local(AdminMessage::new(Admin::SetTimeOnly(time))).await
    }

    /// Mark or unmark `node` as a favourite on the attached device.
    pub async fn set_favourite_node(&self, node: u32, favourite: bool) -> Result<CorrelationId> {
        let variant = if favourite {
            Admin::SetFavoriteNode(node)
        } else {
            Admin::RemoveFavoriteNode(node)
        };
        let id = self.local(AdminMessage::new(variant)).await?;
        self.session.directory().set_favourite(node, favourite);
        Ok(id)
    }

    /// Forget `node` locally and on the attached device.
    pub async fn remove_node(&self, node: u32) -> Result<CorrelationId> {
        self.session.directory().remove_node(node);
        self.local(AdminMessage::new(Admin::RemoveByNodenum(node))).await
    }
}
