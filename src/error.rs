use std::io;

use thiserror::Error;

use crate::protocol::Opcode;

/// Everything that can end a relay connection or a client transfer.
///
/// Only `ShareCodeUnavailable` and `ShareCodeNotFound` are ever reported back
/// to a peer (as their own opcodes); every other variant just closes the
/// connection on the server side.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("protocol violation: expected {expected}, got {got}")]
    ProtocolViolation { expected: &'static str, got: Opcode },

    #[error("share code {0:?} is already taken")]
    ShareCodeUnavailable(String),

    #[error("share code {0:?} not found")]
    ShareCodeNotFound(String),

    #[error("share code {0:?} is already being received")]
    TransferInProgress(String),

    #[error("stream ended before a complete frame header was read")]
    IncompleteFrame,

    #[error("frame declared {declared} payload bytes but only {received} arrived")]
    FrameMismatch { declared: u16, received: usize },

    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("short transfer: copied {copied} of {expected} bytes")]
    ShortTransfer { copied: u64, expected: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RelayError {
    pub fn unexpected(expected: &'static str, got: Opcode) -> Self {
        RelayError::ProtocolViolation { expected, got }
    }
}
