//! # Receiver State Machine
//!
//! Pure logic, no camera. Accepts raw scanned strings, deserializes them,
//! routes packets to the decoder of the active session, and reports progress
//! through [`ReceiverEvent`]s.
//!
//! ## Responsibilities
//!
//! 1. **Deserialization**: parse either framing via [`PacketCodec`]
//! 2. **Session adoption**: start a decoder from the first packet that
//!    carries session constants, when no session is active or the active one
//!    is complete
//! 3. **Orphan buffer**: hold metadata-less packets that arrive before their
//!    session is known, replay them once it is
//! 4. **Filtering**: malformed and foreign packets are dropped, logged and
//!    counted, never raised
//!
//! The receiver does NOT own the scanner. The host feeds it strings.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::config::FountainConfig;
use crate::decoder::{AddOutcome, DecodedPayload, FountainDecoder, PacketStatus};
use crate::error::FountainError;
use crate::session::Session;
use crate::stats::{DecodeProgress, DecoderStats, ReceiverStats};
use crate::wire::{Packet, PacketCodec};

// ─── Events ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverEvent {
    /// A decoder was created for a new session.
    SessionStarted { session_id: String, k: usize },
    /// An accepted packet changed the decode state.
    Progress(DecodeProgress),
    /// All blocks resolved. Check `payload.checksum_verified`.
    Completed {
        session_id: String,
        payload: DecodedPayload,
    },
}

/// What became of one scanned frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
    /// Reached the active decoder.
    Decoded(AddOutcome),
    /// Parked until its session's constants arrive.
    Orphaned,
    /// Dropped before reaching a decoder.
    Dropped(FountainError),
}

enum Route {
    Active,
    Foreign(String),
    Adopt,
}

// ─── Receiver ───────────────────────────────────────────────────────────────

pub struct Receiver {
    codec: PacketCodec,
    elimination: bool,
    orphan_capacity: usize,
    decoder: Option<FountainDecoder>,
    orphans: VecDeque<Packet>,
    events: Vec<ReceiverEvent>,
    stats: ReceiverStats,
}

impl Receiver {
    pub fn new(config: &FountainConfig) -> Self {
        Receiver {
            codec: PacketCodec::from_config(config),
            elimination: config.elimination,
            orphan_capacity: config.orphan_capacity,
            decoder: None,
            orphans: VecDeque::new(),
            events: Vec::new(),
            stats: ReceiverStats::default(),
        }
    }

    /// Feed one scanned string.
    pub fn receive(&mut self, raw: &str) -> Ingest {
        self.stats.frames_scanned += 1;
        match self.codec.deserialize(raw) {
            Ok(packet) => self.ingest(packet),
            Err(e) => {
                if matches!(e, FountainError::SessionMismatch { .. }) {
                    self.stats.session_conflicts += 1;
                } else {
                    self.stats.frames_malformed += 1;
                }
                debug!(error = %e, len = raw.len(), "dropping scanned frame");
                Ingest::Dropped(e)
            }
        }
    }

    /// Feed one already-parsed packet.
    pub fn ingest(&mut self, packet: Packet) -> Ingest {
        let route = match &self.decoder {
            Some(dec) if dec.session().session_id == packet.session_id => Route::Active,
            Some(dec) if !dec.is_complete() => Route::Foreign(dec.session().session_id.clone()),
            _ => Route::Adopt,
        };

        match route {
            Route::Active => self.feed(&packet),
            Route::Foreign(active) => {
                self.stats.foreign_packets += 1;
                debug!(
                    active = %active,
                    found = %packet.session_id,
                    "dropping packet for inactive session"
                );
                Ingest::Dropped(FountainError::SessionMismatch {
                    expected: active,
                    found: packet.session_id,
                })
            }
            Route::Adopt => self.adopt(packet),
        }
    }

    /// Abandon the active session and any parked packets.
    pub fn reset(&mut self) {
        if let Some(dec) = self.decoder.take() {
            info!(
                session_id = %dec.session().session_id,
                resolved = dec.resolved_count(),
                k = dec.k(),
                "receiver reset"
            );
        }
        self.orphans.clear();
    }

    pub fn session(&self) -> Option<&Session> {
        self.decoder.as_ref().map(|d| d.session())
    }

    pub fn decoder(&self) -> Option<&FountainDecoder> {
        self.decoder.as_ref()
    }

    pub fn progress(&self) -> Option<DecodeProgress> {
        self.decoder.as_ref().map(|d| d.progress())
    }

    pub fn payload(&self) -> Option<&DecodedPayload> {
        self.decoder.as_ref().and_then(|d| d.payload())
    }

    pub fn is_complete(&self) -> bool {
        self.decoder.as_ref().is_some_and(|d| d.is_complete())
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn decoder_stats(&self) -> Option<&DecoderStats> {
        self.decoder.as_ref().map(|d| d.stats())
    }

    /// Drain all receiver events.
    pub fn drain_events(&mut self) -> impl Iterator<Item = ReceiverEvent> + '_ {
        self.events.drain(..)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn adopt(&mut self, packet: Packet) -> Ingest {
        let meta = packet
            .meta
            .clone()
            .or_else(|| self.codec.known_meta(&packet.session_id).cloned());
        let Some(meta) = meta else {
            self.park(packet);
            return Ingest::Orphaned;
        };
        let session = match Session::from_meta(packet.session_id.clone(), meta) {
            Ok(session) => session,
            Err(e) => {
                self.stats.frames_malformed += 1;
                debug!(error = %e, "dropping packet with invalid session constants");
                return Ingest::Dropped(e);
            }
        };

        info!(
            session_id = %session.session_id,
            k = session.k,
            total_bytes = session.total_bytes,
            "receiver adopted session"
        );
        self.stats.sessions_started += 1;
        self.events.push(ReceiverEvent::SessionStarted {
            session_id: session.session_id.clone(),
            k: session.k(),
        });
        self.decoder = Some(FountainDecoder::with_elimination(session, self.elimination));

        let outcome = self.feed(&packet);
        self.replay_orphans(&packet.session_id);
        outcome
    }

    fn park(&mut self, packet: Packet) {
        if self.orphan_capacity == 0 {
            self.stats.orphans_evicted += 1;
            return;
        }
        if self.orphans.len() >= self.orphan_capacity {
            self.orphans.pop_front();
            self.stats.orphans_evicted += 1;
        }
        debug!(
            session_id = %packet.session_id,
            packet_id = packet.packet_id,
            "parking packet until session constants arrive"
        );
        self.orphans.push_back(packet);
        self.stats.orphans_buffered += 1;
    }

    fn replay_orphans(&mut self, session_id: &str) {
        let (mine, rest): (Vec<Packet>, Vec<Packet>) = std::mem::take(&mut self.orphans)
            .into_iter()
            .partition(|p| p.session_id == session_id);
        self.orphans = rest.into();
        if !mine.is_empty() {
            debug!(session_id, count = mine.len(), "replaying parked packets");
        }
        for packet in &mine {
            self.feed(packet);
        }
    }

    fn feed(&mut self, packet: &Packet) -> Ingest {
        let Some(dec) = self.decoder.as_mut() else {
            return Ingest::Orphaned;
        };
        let outcome = dec.add_packet(packet);
        if outcome.status == PacketStatus::Accepted {
            self.events.push(ReceiverEvent::Progress(dec.progress()));
        }
        if outcome.completed {
            self.stats.sessions_completed += 1;
            if let Some(payload) = dec.payload() {
                self.events.push(ReceiverEvent::Completed {
                    session_id: dec.session().session_id.clone(),
                    payload: payload.clone(),
                });
            }
        }
        Ingest::Decoded(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FountainEncoder;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 13 + 1) as u8).collect()
    }

    fn encoder(id: &str, len: usize, cfg: &FountainConfig) -> FountainEncoder {
        FountainEncoder::with_session_id(&payload(len), cfg, id).unwrap()
    }

    #[test]
    fn receives_planned_frames() {
        let cfg = FountainConfig::default();
        let enc = encoder("ses_r", 1000, &cfg);
        let mut rx = Receiver::new(&cfg);
        for p in enc.packets(8) {
            rx.receive(&p.to_json());
        }
        assert!(rx.is_complete());
        assert_eq!(&rx.payload().unwrap().bytes[..], &payload(1000)[..]);

        let events: Vec<_> = rx.drain_events().collect();
        assert!(matches!(&events[0], ReceiverEvent::SessionStarted { k: 5, .. }));
        let completed = events
            .iter()
            .filter(|e| matches!(e, ReceiverEvent::Completed { .. }))
            .count();
        assert_eq!(completed, 1);
        assert_eq!(rx.pending_events(), 0);
    }

    #[test]
    fn garbage_is_dropped_and_counted() {
        let mut rx = Receiver::new(&FountainConfig::default());
        assert!(matches!(
            rx.receive("not a packet"),
            Ingest::Dropped(FountainError::MalformedPacket(_))
        ));
        assert!(matches!(rx.receive("{\"sessionId\":1}"), Ingest::Dropped(_)));
        assert_eq!(rx.stats().frames_malformed, 2);
        assert!(rx.session().is_none());
    }

    #[test]
    fn orphans_replay_when_meta_arrives() {
        let cfg = FountainConfig {
            metadata_interval: 1000,
            ..FountainConfig::default()
        };
        let enc = encoder("ses_o", 1000, &cfg);
        let mut rx = Receiver::new(&cfg);
        for id in 1..5 {
            assert_eq!(rx.receive(&enc.encode(id).to_json()), Ingest::Orphaned);
        }
        assert_eq!(rx.orphan_count(), 4);

        rx.receive(&enc.encode(0).to_json());
        assert_eq!(rx.orphan_count(), 0);
        assert!(rx.is_complete());
        assert!(rx.payload().unwrap().checksum_verified);
    }

    #[test]
    fn replay_keeps_other_sessions_parked() {
        let cfg = FountainConfig {
            metadata_interval: 1000,
            ..FountainConfig::default()
        };
        let a = encoder("ses_pa", 1000, &cfg);
        let b = encoder("ses_pb", 1000, &cfg);
        let mut rx = Receiver::new(&cfg);
        rx.receive(&b.encode(2).to_json());
        rx.receive(&a.encode(1).to_json());
        rx.receive(&b.encode(3).to_json());
        assert_eq!(rx.orphan_count(), 3);

        rx.receive(&a.encode(0).to_json());
        assert_eq!(rx.session().unwrap().session_id, "ses_pa");
        assert_eq!(rx.orphan_count(), 2);
        assert_eq!(rx.decoder().unwrap().stats().packets_received, 2);
    }

    #[test]
    fn orphan_buffer_is_bounded() {
        let cfg = FountainConfig {
            metadata_interval: 1000,
            orphan_capacity: 2,
            ..FountainConfig::default()
        };
        let enc = encoder("ses_b", 1000, &cfg);
        let mut rx = Receiver::new(&cfg);
        for id in 1..5 {
            rx.receive(&enc.encode(id).to_json());
        }
        assert_eq!(rx.orphan_count(), 2);
        assert_eq!(rx.stats().orphans_evicted, 2);
    }

    #[test]
    fn foreign_session_dropped_while_active() {
        let cfg = FountainConfig::default();
        let a = encoder("ses_a", 1000, &cfg);
        let b = encoder("ses_b", 1200, &cfg);
        let mut rx = Receiver::new(&cfg);
        rx.receive(&a.encode(0).to_json());
        let before = rx.progress().unwrap();

        let out = rx.receive(&b.encode(0).to_json());
        assert!(matches!(out, Ingest::Dropped(FountainError::SessionMismatch { .. })));
        assert_eq!(rx.progress().unwrap(), before);
        assert_eq!(rx.stats().foreign_packets, 1);
        assert_eq!(rx.session().unwrap().session_id, "ses_a");
    }

    #[test]
    fn new_session_adopted_after_completion() {
        let cfg = FountainConfig::default();
        let a = encoder("ses_a", 1000, &cfg);
        let b = encoder("ses_b", 1200, &cfg);
        let mut rx = Receiver::new(&cfg);
        for p in a.packets(5) {
            rx.receive(&p.to_json());
        }
        assert!(rx.is_complete());

        rx.receive(&b.encode(0).to_json());
        assert_eq!(rx.session().unwrap().session_id, "ses_b");
        assert!(!rx.is_complete());
        assert_eq!(rx.stats().sessions_started, 2);
    }

    #[test]
    fn reset_allows_switching_sessions() {
        let cfg = FountainConfig::default();
        let a = encoder("ses_a", 1000, &cfg);
        let b = encoder("ses_b", 1200, &cfg);
        let mut rx = Receiver::new(&cfg);
        rx.receive(&a.encode(0).to_json());
        rx.reset();
        assert!(rx.session().is_none());
        rx.receive(&b.encode(0).to_json());
        assert_eq!(rx.session().unwrap().session_id, "ses_b");
    }

    #[test]
    fn conflicting_constants_are_rejected() {
        let cfg = FountainConfig::default();
        let enc = encoder("ses_c", 1000, &cfg);
        let mut rx = Receiver::new(&cfg);
        rx.receive(&enc.encode(0).to_json());

        let mut liar = enc.encode(1);
        if let Some(meta) = liar.meta.as_mut() {
            meta.total_bytes = 999;
        }
        let out = rx.receive(&liar.to_json());
        assert!(matches!(out, Ingest::Dropped(FountainError::SessionMismatch { .. })));
        assert_eq!(rx.stats().session_conflicts, 1);
        assert_eq!(rx.progress().unwrap().resolved, 1);
    }
}
