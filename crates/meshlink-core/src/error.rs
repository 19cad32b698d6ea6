//! Error types for request operations
//!
//! Every request issued through a session resolves exactly once, either with
//! its reply or with one of these errors. Errors are categorized so callers
//! can decide whether to retry; the core itself never retries.
//!
//! # Error Categories
//!
//! - **Retryable**: the request may succeed if sent again (timeouts, failed sends)
//! - **Permanent**: the remote node or the session refused, retrying will not help
//!
//! # Example
//!
//! ```no_run
//! use meshlink_core::{RequestError, Result};
//!
//! fn handle_error(err: RequestError) {
//!     if err.is_retryable() {
//!         println!("Transient failure, may retry: {}", err);
//!     } else {
//!         println!("Permanent failure: {}", err);
//!     }
//! }
//! ```

use meshlink_proto::CodecError;
use meshlink_proto::routing::Error as RoutingCode;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// A protocol-level rejection reported in a routing reply.
///
/// Known reasons map to [`RoutingCode`]; unknown numeric codes are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingError(i32);

impl RoutingError {
    /// Wrap a raw routing error code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// Raw numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// The known reason, if the code is one.
    #[must_use]
    pub fn reason(self) -> Option<RoutingCode> {
        RoutingCode::try_from(self.0).ok()
    }

    /// Upper-case protocol name of the reason.
    #[must_use]
    pub fn name(self) -> Cow<'static, str> {
        let name = match self.reason() {
            Some(RoutingCode::None) => "NONE",
            Some(RoutingCode::NoRoute) => "NO_ROUTE",
            Some(RoutingCode::GotNak) => "GOT_NAK",
            Some(RoutingCode::Timeout) => "TIMEOUT",
            Some(RoutingCode::NoInterface) => "NO_INTERFACE",
            Some(RoutingCode::MaxRetransmit) => "MAX_RETRANSMIT",
            Some(RoutingCode::NoChannel) => "NO_CHANNEL",
            Some(RoutingCode::TooLarge) => "TOO_LARGE",
            Some(RoutingCode::NoResponse) => "NO_RESPONSE",
            Some(RoutingCode::DutyCycleLimit) => "DUTY_CYCLE_LIMIT",
            Some(RoutingCode::BadRequest) => "BAD_REQUEST",
            Some(RoutingCode::NotAuthorized) => "NOT_AUTHORIZED",
            Some(RoutingCode::PkiFailed) => "PKI_FAILED",
            Some(RoutingCode::PkiUnknownPubkey) => "PKI_UNKNOWN_PUBKEY",
            Some(RoutingCode::AdminBadSessionKey) => "ADMIN_BAD_SESSION_KEY",
            Some(RoutingCode::AdminPublicKeyUnauthorized) => "ADMIN_PUBLIC_KEY_UNAUTHORIZED",
            Some(RoutingCode::RateLimitExceeded) => "RATE_LIMIT_EXCEEDED",
            None => return Cow::Owned(format!("UNKNOWN({})", self.0)),
        };
        Cow::Borrowed(name)
    }
}

impl From<RoutingCode> for RoutingError {
    fn from(code: RoutingCode) -> Self {
        Self(code as i32)
    }
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Errors that can occur while issuing a request
#[derive(Debug, Error, Clone)]
pub enum RequestError {
    /// No reply arrived before the deadline
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What was being waited for
        operation: Cow<'static, str>,
    },

    /// The session disconnected while the request was outstanding
    #[error("Disconnected")]
    Disconnected,

    /// The mesh or the destination rejected the request
    #[error("Routing error: {0}")]
    Routing(RoutingError),

    /// Outbound message could not be encoded
    #[error("Encode error: {0}")]
    Encode(Cow<'static, str>),

    /// Reply payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(Cow<'static, str>),

    /// Sending to the device failed
    #[error("Transport error: {0}")]
    Transport(Cow<'static, str>),

    /// The request is not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(Cow<'static, str>),

    /// The reply carried a different message than the one requested
    #[error("Unexpected response: expected {expected}, got {got}")]
    UnexpectedResponse {
        /// Variant that was requested
        expected: &'static str,
        /// Variant that arrived
        got: Cow<'static, str>,
    },
}

impl RequestError {
    /// Returns true if sending the request again may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RequestError::Timeout { .. } | RequestError::Transport(_)
        )
    }

    /// Returns true if this error will not go away by retrying on this session
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }

    /// The routing rejection, if this is one
    #[must_use]
    pub fn routing_error(&self) -> Option<RoutingError> {
        match self {
            RequestError::Routing(e) => Some(*e),
            _ => None,
        }
    }

    /// Create a timeout error with static context (zero allocation)
    #[must_use]
    pub const fn timeout(operation: &'static str) -> Self {
        RequestError::Timeout {
            operation: Cow::Borrowed(operation),
        }
    }

    /// Create an invalid state error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_state(context: &'static str) -> Self {
        RequestError::InvalidState(Cow::Borrowed(context))
    }

    /// Create an unexpected response error
    #[must_use]
    pub fn unexpected(expected: &'static str, got: impl Into<Cow<'static, str>>) -> Self {
        RequestError::UnexpectedResponse {
            expected,
            got: got.into(),
        }
    }
}

impl From<CodecError> for RequestError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Decode { .. } => RequestError::Decode(Cow::Owned(err.to_string())),
            _ => RequestError::Encode(Cow::Owned(err.to_string())),
        }
    }
}

impl From<meshlink_transport::TransportError> for RequestError {
    fn from(err: meshlink_transport::TransportError) -> Self {
        if matches!(err, meshlink_transport::TransportError::Closed) {
            return RequestError::Disconnected;
        }
        RequestError::Transport(Cow::Owned(err.to_string()))
    }
}

/// Result type for request operations
pub type Result<T> = std::result::Result<T, RequestError>;
