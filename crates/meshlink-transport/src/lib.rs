//! # meshlink transport
//!
//! Links between the client and an attached radio.
//!
//! This crate provides:
//! - The [`Transport`] trait every link implements
//! - Stream framing (`0x94 0xC3` header) for serial and TCP links
//! - [`StreamTransport`] over TCP or any async byte stream
//! - [`MemoryTransport`], an in-process link driven by a [`RadioHandle`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod framing;
pub mod memory;
pub mod stream;
pub mod transport;

pub use framing::{FramingError, MAX_FRAME_PAYLOAD, StreamFramer, encode_frame};
pub use memory::{MemoryTransport, RadioHandle};
pub use stream::{DEFAULT_TCP_PORT, StreamTransport};
pub use transport::{
    ConnectionStatus, Transport, TransportError, TransportEvent, TransportEvents,
    TransportResult, TransportStats,
};
