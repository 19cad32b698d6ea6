//! Codec errors.

use crate::codec::MessageKind;
use thiserror::Error;

/// Encode/decode failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The message could not be encoded
    #[error("failed to encode {kind}: {reason}")]
    Encode {
        /// Message being encoded
        kind: MessageKind,
        /// Underlying cause
        reason: String,
    },

    /// Encoded message exceeds the allowed size
    #[error("{kind} too large: {size} bytes exceeds limit of {limit}")]
    TooLarge {
        /// Message being encoded
        kind: MessageKind,
        /// Encoded size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// The bytes are not a valid message of the requested kind
    #[error("failed to decode {kind}: {reason}")]
    Decode {
        /// Message being decoded
        kind: MessageKind,
        /// Underlying cause
        reason: String,
    },
}

impl CodecError {
    /// Build a decode error from a prost failure.
    pub fn decode(kind: MessageKind, err: prost::DecodeError) -> Self {
        Self::Decode {
            kind,
            reason: err.to_string(),
        }
    }

    /// Returns true for decode failures.
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
