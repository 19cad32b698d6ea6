//! Application-level file transfer messages, exchanged on `PRIVATE_APP`.
//!
//! The receiver drives the transfer: after accepting an offer it asks for
//! chunks by offset and the sender answers each request with a chunk.

/// Announce a file to a peer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OfferFileTransfer {
    /// Transfer id chosen by the sender
    #[prost(fixed32, tag = "1")]
    pub id: u32,
    /// File name
    #[prost(string, tag = "2")]
    pub file_name: String,
    /// Size in bytes
    #[prost(uint32, tag = "3")]
    pub file_size: u32,
}

/// Refers to an existing transfer (reject, cancel, completed).
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct FileTransferRef {
    /// Transfer id
    #[prost(fixed32, tag = "1")]
    pub file_transfer_id: u32,
}

/// Ask the sender for a byte range.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RequestFileChunk {
    /// Transfer id
    #[prost(fixed32, tag = "1")]
    pub file_transfer_id: u32,
    /// Start offset
    #[prost(uint32, tag = "2")]
    pub offset: u32,
    /// Requested length
    #[prost(uint32, tag = "3")]
    pub length: u32,
}

/// A byte range of the file.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileChunk {
    /// Transfer id
    #[prost(fixed32, tag = "1")]
    pub file_transfer_id: u32,
    /// Start offset
    #[prost(uint32, tag = "2")]
    pub offset: u32,
    /// Length of `data`
    #[prost(uint32, tag = "3")]
    pub length: u32,
    /// Chunk bytes
    #[prost(bytes = "vec", tag = "4")]
    pub data: Vec<u8>,
}

/// Envelope for every file transfer message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileTransferPacket {
    /// Transfer step
    #[prost(oneof = "file_transfer_packet::Item", tags = "1, 2, 3, 4, 5, 6")]
    pub item: Option<file_transfer_packet::Item>,
}

/// Nested types for [`FileTransferPacket`].
pub mod file_transfer_packet {
    /// Transfer step
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Item {
        /// Sender offers a file
        #[prost(message, tag = "1")]
        OfferFileTransfer(super::OfferFileTransfer),
        /// Receiver declines the offer
        #[prost(message, tag = "2")]
        RejectFileTransfer(super::FileTransferRef),
        /// Either side aborts
        #[prost(message, tag = "3")]
        CancelFileTransfer(super::FileTransferRef),
        /// Receiver has every byte
        #[prost(message, tag = "4")]
        CompletedFileTransfer(super::FileTransferRef),
        /// Receiver asks for a range
        #[prost(message, tag = "5")]
        RequestFileChunk(super::RequestFileChunk),
        /// Sender delivers a range
        #[prost(message, tag = "6")]
        FileChunk(super::FileChunk),
    }
}

impl FileTransferPacket {
    /// Wrap a transfer step.
    pub fn new(item: file_transfer_packet::Item) -> Self {
        Self { item: Some(item) }
    }
}
