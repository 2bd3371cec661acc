//! Error types for the relay
//!
//! Defines session-level errors, outbound queue errors, wire decoding
//! errors and client-side input errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::message::{MAX_DESTINATIONS, PAYLOAD_CAPACITY};

/// Application-level errors
///
/// Transport errors are fatal to the affected connection only; the relay
/// keeps serving everyone else.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal to the connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - relay actor is gone)
    #[error("Channel send error")]
    ChannelSend,

    /// Every registry slot is occupied
    #[error("Client registry is full")]
    CapacityExceeded,

    /// The relay answered the handshake with the reserved identity
    #[error("Connection rejected by relay")]
    Rejected,

    /// The peer closed the stream before the handshake completed
    #[error("Connection closed during handshake")]
    HandshakeClosed,

    /// The handshake frame failed its checksum
    #[error("Handshake checksum mismatch")]
    HandshakeCorrupted,

    /// Wire-format violation
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
}

/// Outbound queue errors
///
/// Occurs when handing a message to a connection's writer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The connection's writer task has stopped
    #[error("Channel closed")]
    ChannelClosed,

    /// The connection is not draining its queue fast enough
    #[error("Channel full")]
    ChannelFull,
}

/// Message encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Buffer length does not match the fixed message length
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    /// Routing byte is neither directed nor broadcast
    #[error("unknown routing mode {0}")]
    RoutingMode(u8),

    /// Destination count above the fixed maximum
    #[error("destination count {0} exceeds {max}", max = MAX_DESTINATIONS)]
    TooManyDestinations(usize),

    /// A listed destination is the reserved identity
    #[error("destination list contains the reserved identity")]
    UnassignedDestination,

    /// Acknowledgement flag byte is not 0 or 1
    #[error("invalid ack flag {0}")]
    AckFlag(u8),

    /// Text does not fit the fixed payload capacity
    #[error("payload of {0} bytes exceeds {max} bytes", max = PAYLOAD_CAPACITY - 1)]
    PayloadTooLong(usize),
}

/// Client-side destination input errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Nothing was entered
    #[error("no destination given")]
    Empty,

    /// Token is not an integer
    #[error("invalid destination '{0}'")]
    InvalidNumber(String),

    /// Token is an integer but not a valid identity
    #[error("destination {0} is not a client identity")]
    InvalidIdentity(i64),

    /// Broadcast sentinel combined with explicit identities
    #[error("-1 (broadcast) cannot be combined with other destinations")]
    MixedBroadcast,

    /// More identities than a message can carry
    #[error("at most {max} destinations allowed, got {0}", max = MAX_DESTINATIONS)]
    TooManyDestinations(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_messages_name_the_limit() {
        assert_eq!(
            WireError::TooManyDestinations(4).to_string(),
            "destination count 4 exceeds 3"
        );
        assert_eq!(
            WireError::PayloadTooLong(2000).to_string(),
            "payload of 2000 bytes exceeds 1023 bytes"
        );
        assert_eq!(
            ClientError::TooManyDestinations(5).to_string(),
            "at most 3 destinations allowed, got 5"
        );
    }
}
