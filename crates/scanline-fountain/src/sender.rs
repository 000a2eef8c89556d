//! # Sender
//!
//! Pure logic, no rendering. Wraps a [`FountainEncoder`] and a
//! [`PacketCodec`] and hands out serialized frames for the display loop.
//!
//! The first `plan_count(k)` frames are the planned set. After that the
//! sender keeps minting fresh packet ids on request, so a receiver that
//! missed frames never has to wait for a repeat.

use tracing::debug;

use crate::config::FountainConfig;
use crate::encoder::FountainEncoder;
use crate::error::Result;
use crate::session::Session;
use crate::wire::PacketCodec;

/// One frame ready to render as a visual code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFrame {
    pub packet_id: u32,
    /// Serialized packet text.
    pub text: String,
    /// Beyond the planned set.
    pub is_continuation: bool,
}

pub struct Sender {
    encoder: FountainEncoder,
    codec: PacketCodec,
    planned: u32,
    next_id: u32,
    frames_emitted: u64,
}

impl Sender {
    /// Start a session over `payload`. Fails on an invalid `config`.
    pub fn new(payload: &[u8], config: &FountainConfig) -> Result<Self> {
        let encoder = FountainEncoder::new(payload, config)?;
        Ok(Self::from_encoder(encoder, config))
    }

    pub fn from_encoder(encoder: FountainEncoder, config: &FountainConfig) -> Self {
        let planned = config.redundancy.plan_count(encoder.session().k);
        debug!(
            session_id = %encoder.session().session_id,
            k = encoder.k(),
            planned,
            "sender ready"
        );
        Sender {
            encoder,
            codec: PacketCodec::from_config(config),
            planned,
            next_id: 0,
            frames_emitted: 0,
        }
    }

    pub fn session(&self) -> &Session {
        self.encoder.session()
    }

    pub fn encoder(&self) -> &FountainEncoder {
        &self.encoder
    }

    /// Size of the planned set.
    pub fn planned_count(&self) -> u32 {
        self.planned
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Serialize packet `packet_id`. Does not advance the sender.
    pub fn frame(&self, packet_id: u32) -> Result<OutputFrame> {
        let packet = self.encoder.encode(packet_id);
        Ok(OutputFrame {
            packet_id,
            text: self.codec.serialize(&packet)?,
            is_continuation: packet_id >= self.planned,
        })
    }

    /// Frames `0..planned_count()`.
    pub fn planned_frames(&self) -> Result<Vec<OutputFrame>> {
        (0..self.planned).map(|id| self.frame(id)).collect()
    }

    /// Next frame in id order; runs past the planned set indefinitely.
    pub fn next_frame(&mut self) -> Result<OutputFrame> {
        let frame = self.frame(self.next_id)?;
        self.next_id = self.next_id.wrapping_add(1);
        self.frames_emitted += 1;
        Ok(frame)
    }
}
