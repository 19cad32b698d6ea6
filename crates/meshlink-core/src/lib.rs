//! # meshlink core
//!
//! Request/response correlation for Meshtastic-compatible radios.
//!
//! The device delivers one unordered stream of records. This crate turns it
//! into request-style calls: every outbound request gets a random packet id,
//! a waiter is registered under that id before the packet leaves, and the
//! first inbound packet whose `request_id` matches (from the expected node)
//! completes it. Routing error replies become typed failures, and every
//! routing ack is also kept in an ack log so pings and delivery reports work
//! without a waiter.
//!
//! ## Data flow
//!
//! ```text
//!  api::*  ──▶ Session::request ──▶ Correlator::register ──▶ Transport::send
//!                                          ▲
//!  Transport events ──▶ Dispatcher ──┬─────┘  (handle_packet)
//!                                    ├──▶ AckTracker   (routing acks)
//!                                    └──▶ Directory    (nodes, channels, texts)
//! ```
//!
//! ## Modules
//!
//! - [`session`]: connection lifecycle, sending, background tasks
//! - [`dispatcher`] / [`envelope`]: typed fan-out of inbound records
//! - [`correlator`]: pending response waiters
//! - [`ack`]: ack log
//! - [`routing`]: routing error classification
//! - [`directory`]: nodes, channels, message log
//! - [`api`]: request builders

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ack;
pub mod api;
pub mod config;
pub mod correlator;
pub mod directory;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod packet_id;
pub mod routing;
pub mod session;

pub use ack::{AckRecord, AckTracker};
pub use api::{AdminApi, FileTransferApi, PingResult};
pub use config::SessionConfig;
pub use correlator::{Correlator, CorrelatorStats, MatchOutcome, PendingResponse, ResponseKind};
pub use directory::{Direction, Directory, LoggedMessage};
pub use dispatcher::{DispatchStats, Dispatcher, SubscriptionId};
pub use envelope::{Category, DeviceStatus, InboundEnvelope, PacketPayload, payload_of};
pub use error::{RequestError, Result, RoutingError};
pub use packet_id::{CorrelationId, PacketIdGenerator};
pub use routing::{AckInfo, Classification, ack_info, classify};
pub use session::{OutboundPacket, Session, SessionState};
