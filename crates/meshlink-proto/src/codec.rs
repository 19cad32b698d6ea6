//! Encode/decode keyed by message kind.
//!
//! Both directions are pure functions. Decoding never panics on malformed
//! input; every failure surfaces as a [`CodecError`].

use crate::admin::AdminMessage;
use crate::error::{CodecError, Result};
use crate::file_transfer::FileTransferPacket;
use crate::mesh::{Data, FromRadio, Position, RouteDiscovery, Routing, ToRadio, User};
use crate::telemetry::Telemetry;
use prost::Message;
use std::fmt;

/// The message kinds the codec knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Device-to-client record
    FromRadio,
    /// Client-to-device record
    ToRadio,
    /// Application payload envelope
    Data,
    /// Routing control
    Routing,
    /// Remote administration
    Admin,
    /// User identity
    User,
    /// Position report
    Position,
    /// Telemetry report
    Telemetry,
    /// Traceroute record
    RouteDiscovery,
    /// File transfer step
    FileTransfer,
}

impl MessageKind {
    /// Protobuf-style name of the kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::FromRadio => "FromRadio",
            Self::ToRadio => "ToRadio",
            Self::Data => "Data",
            Self::Routing => "Routing",
            Self::Admin => "AdminMessage",
            Self::User => "User",
            Self::Position => "Position",
            Self::Telemetry => "Telemetry",
            Self::RouteDiscovery => "RouteDiscovery",
            Self::FileTransfer => "FileTransferPacket",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Messages that can go through the codec.
pub trait WireMessage: Message + Default + Sized {
    /// Kind tag used in errors and in [`decode`].
    const KIND: MessageKind;
}

macro_rules! wire_message {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(impl WireMessage for $ty {
            const KIND: MessageKind = MessageKind::$kind;
        })*
    };
}

wire_message! {
    FromRadio => FromRadio,
    ToRadio => ToRadio,
    Data => Data,
    Routing => Routing,
    AdminMessage => Admin,
    User => User,
    Position => Position,
    Telemetry => Telemetry,
    RouteDiscovery => RouteDiscovery,
    FileTransferPacket => FileTransfer,
}

/// A decoded message of any known kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    /// Device-to-client record
    FromRadio(FromRadio),
    /// Client-to-device record
    ToRadio(ToRadio),
    /// Application payload envelope
    Data(Data),
    /// Routing control
    Routing(Routing),
    /// Remote administration
    Admin(AdminMessage),
    /// User identity
    User(User),
    /// Position report
    Position(Position),
    /// Telemetry report
    Telemetry(Telemetry),
    /// Traceroute record
    RouteDiscovery(RouteDiscovery),
    /// File transfer step
    FileTransfer(FileTransferPacket),
}

impl DecodedMessage {
    /// Kind of the decoded message.
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::FromRadio(_) => MessageKind::FromRadio,
            Self::ToRadio(_) => MessageKind::ToRadio,
            Self::Data(_) => MessageKind::Data,
            Self::Routing(_) => MessageKind::Routing,
            Self::Admin(_) => MessageKind::Admin,
            Self::User(_) => MessageKind::User,
            Self::Position(_) => MessageKind::Position,
            Self::Telemetry(_) => MessageKind::Telemetry,
            Self::RouteDiscovery(_) => MessageKind::RouteDiscovery,
            Self::FileTransfer(_) => MessageKind::FileTransfer,
        }
    }
}

/// Encode a message to bytes.
pub fn encode<M: WireMessage>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}

/// Encode a message, refusing results larger than `limit` bytes.
pub fn encode_bounded<M: WireMessage>(message: &M, limit: usize) -> Result<Vec<u8>> {
    let size = message.encoded_len();
    if size > limit {
        return Err(CodecError::TooLarge {
            kind: M::KIND,
            size,
            limit,
        });
    }
    let mut buf = Vec::with_capacity(size);
    message.encode(&mut buf).map_err(|e| CodecError::Encode {
        kind: M::KIND,
        reason: e.to_string(),
    })?;
    Ok(buf)
}

/// Decode bytes as a specific message type.
pub fn decode_as<M: WireMessage>(bytes: &[u8]) -> Result<M> {
    M::decode(bytes).map_err(|e| CodecError::decode(M::KIND, e))
}

/// Decode bytes as the message `kind`.
pub fn decode(kind: MessageKind, bytes: &[u8]) -> Result<DecodedMessage> {
    Ok(match kind {
        MessageKind::FromRadio => DecodedMessage::FromRadio(decode_as(bytes)?),
        MessageKind::ToRadio => DecodedMessage::ToRadio(decode_as(bytes)?),
        MessageKind::Data => DecodedMessage::Data(decode_as(bytes)?),
        MessageKind::Routing => DecodedMessage::Routing(decode_as(bytes)?),
        MessageKind::Admin => DecodedMessage::Admin(decode_as(bytes)?),
        MessageKind::User => DecodedMessage::User(decode_as(bytes)?),
        MessageKind::Position => DecodedMessage::Position(decode_as(bytes)?),
        MessageKind::Telemetry => DecodedMessage::Telemetry(decode_as(bytes)?),
        MessageKind::RouteDiscovery => DecodedMessage::RouteDiscovery(decode_as(bytes)?),
        MessageKind::FileTransfer => DecodedMessage::FileTransfer(decode_as(bytes)?),
    })
}
