//! Error taxonomy for the fountain engine.
//!
//! Only payload-level setup errors are fatal. Everything raised per packet
//! (`MalformedPacket`, `SessionMismatch`) is dropped at the [`Receiver`]
//! boundary and never aborts an in-progress decode.
//!
//! [`Receiver`]: crate::receiver::Receiver

use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FountainError {
    #[error("payload of {len} bytes is below the {min}-byte fountain threshold")]
    PayloadTooSmall { len: usize, min: usize },
    #[error("payload of {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    #[error("session mismatch: expected {expected}, found {found}")]
    SessionMismatch { expected: String, found: String },
    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("serialized packet is {len} bytes, transport unit holds {max}")]
    PacketTooLarge { len: usize, max: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("payload transform failed: {0}")]
    Transform(String),
}

impl FountainError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        FountainError::MalformedPacket(reason.into())
    }

    /// Whether the error concerns a single packet and may be dropped.
    pub fn is_per_packet(&self) -> bool {
        matches!(
            self,
            FountainError::MalformedPacket(_) | FountainError::SessionMismatch { .. }
        )
    }
}

pub type Result<T, E = FountainError> = std::result::Result<T, E>;
