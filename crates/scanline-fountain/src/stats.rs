//! # Decode Statistics
//!
//! Counters for the decoder and receiver, plus a serializable progress
//! snapshot for UIs. Everything here serializes to JSON.

use serde::Serialize;

// ─── Decoder Stats ──────────────────────────────────────────────────────────

/// Per-session decoder counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Packets offered to the decoder, including rejected ones.
    pub packets_received: u64,
    /// Packets that contributed an equation or a block.
    pub packets_accepted: u64,
    /// Packets whose `packet_id` was already seen.
    pub duplicates: u64,
    /// Packets from another session or with conflicting constants.
    pub foreign_session: u64,
    /// Packets failing range or length checks.
    pub malformed: u64,
    /// Equations that carried no new information.
    pub redundant: u64,
    /// Equations contradicting already-resolved blocks.
    pub inconsistent: u64,
    /// Blocks resolved by the peeling cascade.
    pub resolved_by_peeling: u64,
    /// Blocks resolved by Gaussian elimination.
    pub resolved_by_elimination: u64,
    /// Elimination passes run.
    pub elimination_passes: u64,
}

impl DecoderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of received packets that were accepted.
    pub fn acceptance_ratio(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.packets_accepted as f64 / self.packets_received as f64
        }
    }
}

// ─── Receiver Stats ─────────────────────────────────────────────────────────

/// Text-level counters, across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Strings handed to the receiver.
    pub frames_scanned: u64,
    /// Strings that failed to parse or validate.
    pub frames_malformed: u64,
    /// Packets rejected for conflicting session constants.
    pub session_conflicts: u64,
    /// Packets for a session other than the active one.
    pub foreign_packets: u64,
    /// Metadata-less packets parked before their session was known.
    pub orphans_buffered: u64,
    /// Parked packets evicted by the orphan buffer limit.
    pub orphans_evicted: u64,
    /// Sessions started.
    pub sessions_started: u64,
    /// Sessions completed.
    pub sessions_completed: u64,
}

// ─── Progress ───────────────────────────────────────────────────────────────

/// Snapshot of one session's decode progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeProgress {
    pub session_id: String,
    pub k: usize,
    pub resolved: usize,
    pub pending: usize,
    pub unresolved: Vec<u32>,
    pub complete: bool,
    /// `None` until the session completes.
    pub checksum_verified: Option<bool>,
}

impl DecodeProgress {
    /// Resolved share of source blocks in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.k == 0 {
            0.0
        } else {
            self.resolved as f64 / self.k as f64
        }
    }
}
