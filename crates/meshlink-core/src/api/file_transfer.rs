//! File transfer steps.
//!
//! Transfers run on the private-app port between two clients. Every step is
//! a single [`FileTransferPacket`] that completes once the peer's radio acks
//! it; the peer's own answers arrive as ordinary inbound packets, which
//! [`parse_file_transfer`] recognises.
//!
//! ```text
//!   sender                                   receiver
//!     │── offer ───────────────────────────────▶│
//!     │◀──────────────────────── request chunk ──│  (or reject)
//!     │── chunk ───────────────────────────────▶│
//!     │          ...                             │
//!     │◀──────────────────────────── completed ──│
//! ```

use crate::correlator::ResponseKind;
use crate::error::Result;
use crate::session::{OutboundPacket, Session};
use meshlink_proto::file_transfer::{FileChunk, FileTransferRef, OfferFileTransfer, RequestFileChunk};
use meshlink_proto::{FileTransferPacket, MeshPacket, PortNum, decode_as, encode, file_transfer_packet::Item};
use std::time::Duration;

/// File transfer steps issued through a [`Session`].
#[derive(Clone, Copy)]
pub struct FileTransferApi<'a> {
    session: &'a Session,
    timeout: Duration,
}

impl Session {
    /// File transfer steps with the session's default deadline.
    pub fn file_transfer(&self) -> FileTransferApi<'_> {
        FileTransferApi {
            session: self,
            timeout: self.config().request_timeout,
        }
    }
}

impl FileTransferApi<'_> {
    /// Use `timeout` instead of the session default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn send(&self, node: u32, item: Item, operation: &'static str) -> Result<()> {
        let payload = encode(&FileTransferPacket::new(item));
        let packet = OutboundPacket::new(node, PortNum::PrivateApp, payload)
            .on_channel(self.session.directory().node_channel(node))
            .want_ack()
            .named(operation);
        self.session
            .request(packet, ResponseKind::Ack, self.timeout)
            .await
            .map(drop)
    }

    /// Offer a file to `node`.
    pub async fn offer(&self, node: u32, transfer_id: u32, file_name: &str, file_size: u32) -> Result<()> {
        let offer = OfferFileTransfer {
            id: transfer_id,
            file_name: file_name.to_string(),
            file_size,
        };
        self.send(node, Item::OfferFileTransfer(offer), "offer_file_transfer")
            .await
    }

    /// Decline an offer.
    pub async fn reject(&self, node: u32, transfer_id: u32) -> Result<()> {
        let item = Item::RejectFileTransfer(FileTransferRef {
            file_transfer_id: transfer_id,
        });
        self.send(node, item, "reject_file_transfer").await
    }

    /// Abort a transfer from either side.
    pub async fn cancel(&self, node: u32, transfer_id: u32) -> Result<()> {
        let item = Item::CancelFileTransfer(FileTransferRef {
            file_transfer_id: transfer_id,
        });
        self.send(node, item, "cancel_file_transfer").await
    }

    /// Tell the sender every byte arrived.
    pub async fn complete(&self, node: u32, transfer_id: u32) -> Result<()> {
        let item = Item::CompletedFileTransfer(FileTransferRef {
            file_transfer_id: transfer_id,
        });
        self.send(node, item, "complete_file_transfer").await
    }

    /// Ask the sender for `length` bytes at `offset`.
    pub async fn request_chunk(&self, node: u32, transfer_id: u32, offset: u32, length: u32) -> Result<()> {
        let item = Item::RequestFileChunk(RequestFileChunk {
            file_transfer_id: transfer_id,
            offset,
            length,
        });
        self.send(node, item, "request_file_chunk").await
    }

    /// Deliver bytes at `offset`.
    pub async fn send_chunk(&self, node: u32, transfer_id: u32, offset: u32, data: Vec<u8>) -> Result<()> {
        let item = Item::FileChunk(FileChunk {
            file_transfer_id: transfer_id,
            offset,
            length: u32::try_from(data.len()).unwrap_or(u32::MAX),
            data,
        });
        self.send(node, item, "file_chunk").await
    }
}

/// The transfer step carried by an inbound private-app packet, if any.
pub fn parse_file_transfer(packet: &MeshPacket) -> Option<Item> {
    let data = packet.decoded()?;
    if data.portnum() != PortNum::PrivateApp || data.payload.is_empty() {
        return None;
    }
    decode_as::<FileTransferPacket>(&data.payload).ok()?.item
}
