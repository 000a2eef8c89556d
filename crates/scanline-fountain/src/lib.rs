//! # scanline-fountain
//!
//! Fountain (LT-style rateless erasure) coding for moving a bounded payload
//! across an air gap as a stream of visual codes.
//!
//! A payload is split into `k` fixed-size source blocks. Each packet carries
//! the XOR of a pseudo-randomly chosen subset of blocks, reproducible from
//! `(session_id, packet_id)` alone. A receiver scanning packets in any order
//! recovers the payload by peeling, falling back to GF(2) elimination when
//! peeling stalls, and verifies it with a crc32 checksum.
//!
//! ## Crate structure
//!
//! - [`config`]: Engine policy, TOML input layer
//! - [`error`]: Error taxonomy
//! - [`ids`]: Prefixed session ids
//! - [`integrity`]: crc32 checksum
//! - [`splitter`]: Payload ↔ source blocks
//! - [`sampler`]: Seeded PRNG and degree distribution
//! - [`planner`]: Planned packet count per session
//! - [`session`]: Session constants
//! - [`encoder`]: Packet production
//! - [`wire`]: Packet framings (JSON, compact), VarInt, codec
//! - [`decoder`]: Peeling + incremental elimination
//! - [`stats`]: Counters and progress snapshots
//! - [`sender`]: Frame source for the display loop
//! - [`receiver`]: Scanned-text ingestion state machine
//! - [`transform`]: Optional pre-encode payload transforms

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod ids;
pub mod integrity;
pub mod planner;
pub mod receiver;
pub mod sampler;
pub mod sender;
pub mod session;
pub mod splitter;
pub mod stats;
pub mod transform;
pub mod wire;

pub use config::FountainConfig;
pub use decoder::{AddOutcome, DecodedPayload, FountainDecoder, PacketStatus};
pub use encoder::FountainEncoder;
pub use error::{FountainError, Result};
pub use planner::plan_count;
pub use receiver::{Ingest, Receiver, ReceiverEvent};
pub use sender::{OutputFrame, Sender};
pub use session::{Session, SessionMeta};
pub use wire::{Framing, Packet, PacketCodec};
