//! # Fountain Decoder
//!
//! Pure logic, no I/O. Ingests packets of one session in any order and
//! reconstructs the source blocks.
//!
//! ## Algorithm
//!
//! 1. **Reduce**: XOR every already-resolved block out of the packet.
//! 2. **Peel**: a packet left with one unknown *is* that source block.
//!    Resolving it reduces every pending row that covers the block, which may
//!    expose more degree-1 rows (the cascade).
//! 3. **Eliminate**: when peeling stalls, rows that arrived since the last
//!    pass are folded into a reduced GF(2) basis over the unresolved blocks.
//!    A basis row left with a single coefficient resolves another block and
//!    feeds back into the cascade.
//!
//! Basis rows keep the invariant that a row's pivot column is clear in every
//! other basis row, so each pass only touches rows added since the previous
//! one instead of re-solving the whole system.
//!
//! All mutations are monotonic: blocks only move from unknown to resolved.

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::encoder::xor_into;
use crate::error::{FountainError, Result};
use crate::integrity;
use crate::session::Session;
use crate::splitter::join_blocks;
use crate::stats::{DecodeProgress, DecoderStats};
use crate::wire::Packet;

// ─── GF(2) Row Bitsets ──────────────────────────────────────────────────────

mod bitrow {
    /// Coefficient vector over GF(2), one bit per source block.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct BitRow {
        words: Vec<u64>,
    }

    impl BitRow {
        pub fn zeros(width: usize) -> Self {
            BitRow {
                words: vec![0; width.div_ceil(64)],
            }
        }

        #[inline]
        pub fn get(&self, i: usize) -> bool {
            self.words[i / 64] & (1u64 << (i % 64)) != 0
        }

        #[inline]
        pub fn set(&mut self, i: usize) {
            self.words[i / 64] |= 1u64 << (i % 64);
        }

        #[inline]
        pub fn clear(&mut self, i: usize) {
            self.words[i / 64] &= !(1u64 << (i % 64));
        }

        pub fn xor_assign(&mut self, other: &BitRow) {
            for (a, b) in self.words.iter_mut().zip(&other.words) {
                *a ^= b;
            }
        }

        pub fn count_ones(&self) -> usize {
            self.words.iter().map(|w| w.count_ones() as usize).sum()
        }

        pub fn first_one(&self) -> Option<usize> {
            self.words
                .iter()
                .enumerate()
                .find(|(_, &w)| w != 0)
                .map(|(n, w)| n * 64 + w.trailing_zeros() as usize)
        }

        pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
            self.words.iter().enumerate().flat_map(|(n, &w)| {
                let mut rest = w;
                std::iter::from_fn(move || {
                    if rest == 0 {
                        return None;
                    }
                    let bit = rest.trailing_zeros() as usize;
                    rest &= rest - 1;
                    Some(n * 64 + bit)
                })
            })
        }
    }
}

use bitrow::BitRow;

/// A pending equation: XOR of the blocks in `cols` equals `data`.
#[derive(Clone, Debug)]
struct Row {
    cols: BitRow,
    degree: usize,
    data: Vec<u8>,
    /// `Some(col)` once the row has joined the reduced basis.
    pivot: Option<usize>,
}

impl Row {
    fn refresh_degree(&mut self) {
        self.degree = self.cols.count_ones();
    }
}

/// `rows[dst] ^= rows[src]`.
fn xor_rows(rows: &mut [Row], dst: usize, src: usize) {
    debug_assert_ne!(dst, src);
    let (d, s) = if dst < src {
        let (lo, hi) = rows.split_at_mut(src);
        (&mut lo[dst], &hi[0])
    } else {
        let (lo, hi) = rows.split_at_mut(dst);
        (&mut hi[0], &lo[src])
    };
    d.cols.xor_assign(&s.cols);
    xor_into(&mut d.data, &s.data);
    d.refresh_degree();
}

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// What happened to one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// Contributed a new equation or block.
    Accepted,
    /// `packet_id` seen before; nothing changed.
    Duplicate,
    /// Different session, or conflicting session constants.
    ForeignSession,
    /// Fails range or length checks for this session.
    Malformed,
    /// Fully covered by resolved blocks and consistent with them.
    Redundant,
    /// Fully covered by resolved blocks but its data disagrees.
    Inconsistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub status: PacketStatus,
    /// The session was already complete before this packet.
    pub already_complete: bool,
    /// Blocks resolved as a consequence of this packet.
    pub newly_resolved: usize,
    /// This packet completed the session.
    pub completed: bool,
}

/// Reconstructed payload. Decoding success and integrity success are
/// reported separately; the bytes are returned either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    pub bytes: Bytes,
    pub checksum_verified: bool,
    pub expected_checksum: String,
    pub actual_checksum: String,
}

impl DecodedPayload {
    /// The bytes, or [`FountainError::ChecksumMismatch`].
    pub fn verify(&self) -> Result<&Bytes> {
        if self.checksum_verified {
            Ok(&self.bytes)
        } else {
            Err(FountainError::ChecksumMismatch {
                expected: self.expected_checksum.clone(),
                actual: self.actual_checksum.clone(),
            })
        }
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Decode state for exactly one session. Single writer.
pub struct FountainDecoder {
    session: Session,
    elimination: bool,
    resolved: Vec<Option<Bytes>>,
    resolved_count: usize,
    pending: Vec<Row>,
    received: HashSet<u32>,
    payload: Option<DecodedPayload>,
    stats: DecoderStats,
}

impl FountainDecoder {
    pub fn new(session: Session) -> Self {
        Self::with_elimination(session, true)
    }

    /// `elimination = false` gives a pure peeling decoder.
    pub fn with_elimination(session: Session, elimination: bool) -> Self {
        let k = session.k();
        FountainDecoder {
            session,
            elimination,
            resolved: vec![None; k],
            resolved_count: 0,
            pending: Vec::new(),
            received: HashSet::new(),
            payload: None,
            stats: DecoderStats::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn k(&self) -> usize {
        self.resolved.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved_count
    }

    pub fn is_complete(&self) -> bool {
        self.resolved_count == self.k()
    }

    /// Resolved blocks by index.
    pub fn resolved(&self) -> &[Option<Bytes>] {
        &self.resolved
    }

    pub fn unresolved_indices(&self) -> Vec<u32> {
        self.resolved
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_none())
            .map(|(i, _)| i as u32)
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending equations as `(indices, data)`, in storage order.
    pub fn pending_rows(&self) -> Vec<(Vec<u32>, Vec<u8>)> {
        self.pending
            .iter()
            .map(|row| (row.cols.ones().map(|i| i as u32).collect(), row.data.clone()))
            .collect()
    }

    pub fn has_packet(&self, packet_id: u32) -> bool {
        self.received.contains(&packet_id)
    }

    pub fn payload(&self) -> Option<&DecodedPayload> {
        self.payload.as_ref()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    pub fn progress(&self) -> DecodeProgress {
        DecodeProgress {
            session_id: self.session.session_id.clone(),
            k: self.k(),
            resolved: self.resolved_count,
            pending: self.pending.len(),
            unresolved: self.unresolved_indices(),
            complete: self.is_complete(),
            checksum_verified: self.payload.as_ref().map(|p| p.checksum_verified),
        }
    }

    /// Ingest one packet. Never fails: per-packet problems are reported in
    /// the returned status and leave the decode state untouched.
    pub fn add_packet(&mut self, packet: &Packet) -> AddOutcome {
        let already_complete = self.is_complete();
        self.stats.packets_received += 1;

        if let Some(status) = self.screen(packet) {
            return AddOutcome {
                status,
                already_complete,
                newly_resolved: 0,
                completed: false,
            };
        }
        self.received.insert(packet.packet_id);

        if already_complete {
            self.stats.redundant += 1;
            return AddOutcome {
                status: PacketStatus::Redundant,
                already_complete,
                newly_resolved: 0,
                completed: false,
            };
        }

        let before = self.resolved_count;
        let status = self.absorb(packet);
        if self.elimination && !self.is_complete() && self.pending.iter().any(|r| r.pivot.is_none()) {
            self.eliminate();
        }
        let newly_resolved = self.resolved_count - before;
        if status == PacketStatus::Accepted {
            self.stats.packets_accepted += 1;
        }

        let completed = self.is_complete();
        if completed {
            self.finish();
        }
        AddOutcome {
            status,
            already_complete,
            newly_resolved,
            completed,
        }
    }

    /// Rejection checks that must not touch state.
    fn screen(&mut self, packet: &Packet) -> Option<PacketStatus> {
        if packet.session_id != self.session.session_id {
            self.stats.foreign_session += 1;
            debug!(
                active = %self.session.session_id,
                found = %packet.session_id,
                packet_id = packet.packet_id,
                "dropping packet from foreign session"
            );
            return Some(PacketStatus::ForeignSession);
        }
        if let Some(meta) = &packet.meta {
            if !meta.same_constants(&self.session.meta()) {
                self.stats.foreign_session += 1;
                debug!(
                    session_id = %self.session.session_id,
                    packet_id = packet.packet_id,
                    "dropping packet with conflicting session constants"
                );
                return Some(PacketStatus::ForeignSession);
            }
        }
        let checked = packet
            .check_shape()
            .and_then(|_| packet.check_against(&self.session.meta()));
        if let Err(e) = checked {
            self.stats.malformed += 1;
            debug!(packet_id = packet.packet_id, error = %e, "dropping malformed packet");
            return Some(PacketStatus::Malformed);
        }
        if self.received.contains(&packet.packet_id) {
            self.stats.duplicates += 1;
            trace!(packet_id = packet.packet_id, "duplicate packet");
            return Some(PacketStatus::Duplicate);
        }
        None
    }

    /// Reduce against resolved blocks, then peel or park.
    fn absorb(&mut self, packet: &Packet) -> PacketStatus {
        let mut cols = BitRow::zeros(self.k());
        let mut data = packet.data.to_vec();
        for &idx in &packet.indices {
            match &self.resolved[idx as usize] {
                Some(block) => xor_into(&mut data, block),
                None => cols.set(idx as usize),
            }
        }
        let degree = cols.count_ones();

        match degree {
            0 => {
                let status = self.classify_empty(&data);
                if status == PacketStatus::Inconsistent {
                    debug!(
                        packet_id = packet.packet_id,
                        "discarding packet inconsistent with resolved blocks"
                    );
                }
                status
            }
            1 => {
                let col = cols.first_one().unwrap_or_default();
                let resolved = self.cascade(VecDeque::from([(col, data)]));
                self.stats.resolved_by_peeling += resolved as u64;
                PacketStatus::Accepted
            }
            _ => {
                self.pending.push(Row {
                    cols,
                    degree,
                    data,
                    pivot: None,
                });
                PacketStatus::Accepted
            }
        }
    }

    /// A row with no unknowns left: consistent or corrupt.
    fn classify_empty(&mut self, residue: &[u8]) -> PacketStatus {
        if residue.iter().all(|&b| b == 0) {
            self.stats.redundant += 1;
            PacketStatus::Redundant
        } else {
            self.stats.inconsistent += 1;
            PacketStatus::Inconsistent
        }
    }

    /// Resolve queued blocks and propagate each through `pending`.
    /// Returns how many blocks were newly resolved.
    fn cascade(&mut self, mut queue: VecDeque<(usize, Vec<u8>)>) -> usize {
        let mut count = 0;
        while let Some((col, data)) = queue.pop_front() {
            if let Some(existing) = &self.resolved[col] {
                if existing[..] != data[..] {
                    self.stats.inconsistent += 1;
                    debug!(block = col, "conflicting value for resolved block ignored");
                }
                continue;
            }
            let block = Bytes::from(data);
            self.resolved[col] = Some(block.clone());
            self.resolved_count += 1;
            count += 1;

            let mut singles = Vec::new();
            self.pending.retain_mut(|row| {
                if !row.cols.get(col) {
                    return true;
                }
                row.cols.clear(col);
                xor_into(&mut row.data, &block);
                row.degree -= 1;
                if row.pivot == Some(col) {
                    row.pivot = None;
                }
                if row.degree <= 1 {
                    singles.push((row.cols.first_one(), std::mem::take(&mut row.data)));
                    false
                } else {
                    true
                }
            });
            for (next, data) in singles {
                match next {
                    Some(next) => queue.push_back((next, data)),
                    None => {
                        self.classify_empty(&data);
                    }
                }
            }
        }
        count
    }

    /// Fold raw rows into the reduced basis and peel what falls out.
    fn eliminate(&mut self) {
        while !self.is_complete() && self.pending.iter().any(|r| r.pivot.is_none()) {
            self.stats.elimination_passes += 1;
            let mut pivots: Vec<(usize, usize)> = self
                .pending
                .iter()
                .enumerate()
                .filter_map(|(r, row)| row.pivot.map(|p| (p, r)))
                .collect();
            let mut dropped = vec![false; self.pending.len()];

            for r in 0..self.pending.len() {
                if self.pending[r].pivot.is_some() {
                    continue;
                }
                for &(col, basis) in &pivots {
                    if self.pending[r].cols.get(col) {
                        xor_rows(&mut self.pending, r, basis);
                    }
                }
                let Some(pivot) = self.pending[r].cols.first_one() else {
                    let residue = std::mem::take(&mut self.pending[r].data);
                    self.classify_empty(&residue);
                    dropped[r] = true;
                    continue;
                };
                for &(_, basis) in &pivots {
                    if self.pending[basis].cols.get(pivot) {
                        xor_rows(&mut self.pending, basis, r);
                    }
                }
                self.pending[r].pivot = Some(pivot);
                pivots.push((pivot, r));
            }

            let mut queue = VecDeque::new();
            let mut idx = 0;
            self.pending.retain_mut(|row| {
                let keep = !dropped[idx];
                idx += 1;
                if keep && row.degree == 1 {
                    if let Some(col) = row.cols.first_one() {
                        queue.push_back((col, std::mem::take(&mut row.data)));
                    }
                    return false;
                }
                keep
            });

            trace!(
                session_id = %self.session.session_id,
                basis = self.pending.len(),
                singletons = queue.len(),
                "elimination pass"
            );
            if queue.is_empty() {
                break;
            }
            let seeded = queue.len();
            let resolved = self.cascade(queue);
            let by_elimination = resolved.min(seeded);
            self.stats.resolved_by_elimination += by_elimination as u64;
            self.stats.resolved_by_peeling += (resolved - by_elimination) as u64;
        }
    }

    fn finish(&mut self) {
        if self.payload.is_some() {
            return;
        }
        let blocks: Vec<Bytes> = self.resolved.iter().flatten().cloned().collect();
        let bytes = join_blocks(&blocks, self.session.total_bytes as usize);
        let actual = integrity::checksum(&bytes);
        let checksum_verified = integrity::verify(&bytes, &self.session.checksum);
        if checksum_verified {
            info!(
                session_id = %self.session.session_id,
                k = self.k(),
                packets = self.received.len(),
                "fountain session complete"
            );
        } else {
            warn!(
                session_id = %self.session.session_id,
                expected = %self.session.checksum,
                actual = %actual,
                "fountain session complete but checksum mismatch"
            );
        }
        self.pending.clear();
        self.payload = Some(DecodedPayload {
            bytes,
            checksum_verified,
            expected_checksum: self.session.checksum.clone(),
            actual_checksum: actual,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FountainConfig;
    use crate::encoder::FountainEncoder;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    fn encoder(len: usize) -> FountainEncoder {
        FountainEncoder::with_session_id(&payload(len), &FountainConfig::default(), "ses_dec").unwrap()
    }

    /// Packet over explicit indices, built from the encoder's blocks.
    fn combo(enc: &FountainEncoder, packet_id: u32, indices: &[u32]) -> Packet {
        Packet {
            session_id: enc.session().session_id.clone(),
            packet_id,
            meta: None,
            indices: indices.to_vec(),
            data: crate::encoder::xor_blocks(enc.blocks(), indices, 200),
        }
    }

    // ─── Bitrow ─────────────────────────────────────────────────────────

    #[test]
    fn bitrow_ops() {
        let mut a = BitRow::zeros(130);
        a.set(0);
        a.set(64);
        a.set(129);
        assert_eq!(a.count_ones(), 3);
        assert_eq!(a.ones().collect::<Vec<_>>(), vec![0, 64, 129]);
        let mut b = BitRow::zeros(130);
        b.set(64);
        a.xor_assign(&b);
        assert!(!a.get(64));
        a.clear(0);
        assert_eq!(a.first_one(), Some(129));
    }

    // ─── Peeling ────────────────────────────────────────────────────────

    #[test]
    fn systematic_packets_resolve_directly() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        for id in 0..5 {
            let out = dec.add_packet(&enc.encode(id));
            assert_eq!(out.status, PacketStatus::Accepted);
            assert_eq!(out.newly_resolved, 1);
        }
        assert!(dec.is_complete());
        let decoded = dec.payload().unwrap();
        assert!(decoded.checksum_verified);
        assert_eq!(&decoded.bytes[..], &payload(1000)[..]);
    }

    #[test]
    fn reduction_strips_known_blocks() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        dec.add_packet(&combo(&enc, 0, &[4]));
        dec.add_packet(&combo(&enc, 1, &[1, 2, 4]));
        let rows = dec.pending_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, vec![1, 2]);
        let mut expected = enc.blocks()[1].to_vec();
        xor_into(&mut expected, &enc.blocks()[2]);
        assert_eq!(rows[0].1, expected);
    }

    #[test]
    fn cascade_resolves_chain() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::with_elimination(enc.session().clone(), false);
        dec.add_packet(&combo(&enc, 10, &[3, 4]));
        dec.add_packet(&combo(&enc, 11, &[2, 3]));
        dec.add_packet(&combo(&enc, 12, &[1, 2]));
        dec.add_packet(&combo(&enc, 13, &[0, 1]));
        assert_eq!(dec.resolved_count(), 0);

        let out = dec.add_packet(&combo(&enc, 14, &[4]));
        assert_eq!(out.newly_resolved, 5);
        assert!(out.completed);
        assert!(dec.payload().unwrap().checksum_verified);
    }

    #[test]
    fn redundant_and_inconsistent_packets() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        dec.add_packet(&combo(&enc, 0, &[0]));
        dec.add_packet(&combo(&enc, 1, &[1]));

        let out = dec.add_packet(&combo(&enc, 20, &[0, 1]));
        assert_eq!(out.status, PacketStatus::Redundant);

        let mut corrupt = combo(&enc, 21, &[0, 1]);
        let mut bytes = corrupt.data.to_vec();
        bytes[0] ^= 0xFF;
        corrupt.data = Bytes::from(bytes);
        let out = dec.add_packet(&corrupt);
        assert_eq!(out.status, PacketStatus::Inconsistent);
        assert_eq!(dec.resolved_count(), 2);
        assert_eq!(dec.stats().inconsistent, 1);
    }

    // ─── Elimination ────────────────────────────────────────────────────

    #[test]
    fn elimination_solves_peeling_stall() {
        // No degree-1 packet anywhere, but the system has full rank.
        let enc = encoder(1000);
        let rows: [&[u32]; 5] = [&[0, 1], &[1, 2], &[2, 3], &[3, 4], &[0, 1, 2, 3, 4]];

        let mut peel_only = FountainDecoder::with_elimination(enc.session().clone(), false);
        let mut full = FountainDecoder::new(enc.session().clone());
        for (id, idx) in rows.iter().enumerate() {
            peel_only.add_packet(&combo(&enc, 100 + id as u32, idx));
            full.add_packet(&combo(&enc, 100 + id as u32, idx));
        }
        assert_eq!(peel_only.resolved_count(), 0);
        assert!(full.is_complete());
        assert!(full.stats().resolved_by_elimination >= 1);
        assert!(full.stats().elimination_passes >= 1);
        assert_eq!(&full.payload().unwrap().bytes[..], &payload(1000)[..]);
    }

    #[test]
    fn elimination_recovers_partial_blocks_under_rank_deficiency() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        // {0,1} and {0,1,2} pin down block 2; blocks 0,1,3,4 stay open.
        dec.add_packet(&combo(&enc, 100, &[0, 1]));
        dec.add_packet(&combo(&enc, 101, &[0, 1, 2]));
        dec.add_packet(&combo(&enc, 102, &[3, 4]));
        assert_eq!(dec.resolved_count(), 1);
        assert_eq!(dec.resolved()[2].as_deref(), Some(&enc.blocks()[2][..]));
        assert_eq!(dec.unresolved_indices(), vec![0, 1, 3, 4]);
        assert!(!dec.is_complete());
    }

    #[test]
    fn dependent_rows_are_dropped() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        dec.add_packet(&combo(&enc, 100, &[0, 1]));
        dec.add_packet(&combo(&enc, 101, &[1, 2]));
        let out = dec.add_packet(&combo(&enc, 102, &[0, 2]));
        assert_eq!(out.newly_resolved, 0);
        assert_eq!(dec.pending_len(), 2);
        assert_eq!(dec.stats().redundant, 1);
    }

    // ─── Rejections ─────────────────────────────────────────────────────

    #[test]
    fn duplicates_do_not_change_state() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        dec.add_packet(&combo(&enc, 7, &[0, 3]));
        let before = dec.pending_rows();
        let out = dec.add_packet(&combo(&enc, 7, &[0, 3]));
        assert_eq!(out.status, PacketStatus::Duplicate);
        assert_eq!(dec.pending_rows(), before);
    }

    #[test]
    fn foreign_session_is_ignored() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        let mut foreign = enc.encode(0);
        foreign.session_id = "ses_other".into();
        let out = dec.add_packet(&foreign);
        assert_eq!(out.status, PacketStatus::ForeignSession);
        assert_eq!(dec.resolved_count(), 0);
        // The foreign packet id is not burned for the real session.
        assert!(!dec.has_packet(0));
        assert_eq!(dec.add_packet(&enc.encode(0)).status, PacketStatus::Accepted);
    }

    #[test]
    fn out_of_range_packet_is_malformed() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        let mut bad = enc.encode(3);
        bad.indices = vec![9];
        bad.meta = None;
        assert_eq!(dec.add_packet(&bad).status, PacketStatus::Malformed);
        assert_eq!(dec.stats().malformed, 1);
    }

    #[test]
    fn empty_indices_are_malformed() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        let mut bad = enc.encode(0);
        bad.indices.clear();
        assert_eq!(dec.add_packet(&bad).status, PacketStatus::Malformed);
        assert!(!dec.has_packet(0));
        assert_eq!(dec.resolved_count(), 0);
    }

    #[test]
    fn packets_after_completion_are_redundant() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        for p in enc.packets(5) {
            dec.add_packet(&p);
        }
        let out = dec.add_packet(&enc.encode(6));
        assert!(out.already_complete);
        assert_eq!(out.status, PacketStatus::Redundant);
        assert_eq!(out.newly_resolved, 0);
    }

    // ─── Integrity ──────────────────────────────────────────────────────

    #[test]
    fn checksum_case_is_not_a_conflict() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        for mut p in enc.packets(5) {
            if let Some(meta) = p.meta.as_mut() {
                meta.checksum = meta.checksum.to_ascii_uppercase();
            }
            assert_eq!(dec.add_packet(&p).status, PacketStatus::Accepted);
        }
        assert!(dec.payload().unwrap().checksum_verified);
    }

    #[test]
    fn checksum_mismatch_still_returns_bytes() {
        let enc = encoder(1000);
        let mut session = enc.session().clone();
        session.checksum = "00000000".into();
        let mut dec = FountainDecoder::new(session);
        for mut p in enc.packets(5) {
            p.meta = None;
            dec.add_packet(&p);
        }
        assert!(dec.is_complete());
        let decoded = dec.payload().unwrap();
        assert!(!decoded.checksum_verified);
        assert_eq!(&decoded.bytes[..], &payload(1000)[..]);
        assert!(matches!(
            decoded.verify(),
            Err(FountainError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn trailing_partial_block_is_trimmed() {
        let enc = FountainEncoder::with_session_id(&payload(901), &FountainConfig::default(), "ses_t").unwrap();
        let mut dec = FountainDecoder::new(enc.session().clone());
        for p in enc.packets(5) {
            dec.add_packet(&p);
        }
        let decoded = dec.payload().unwrap();
        assert_eq!(decoded.bytes.len(), 901);
        assert!(decoded.verify().is_ok());
    }

    #[test]
    fn progress_snapshot() {
        let enc = encoder(1000);
        let mut dec = FountainDecoder::new(enc.session().clone());
        dec.add_packet(&enc.encode(1));
        dec.add_packet(&combo(&enc, 50, &[2, 3]));
        let progress = dec.progress();
        assert_eq!(progress.k, 5);
        assert_eq!(progress.resolved, 1);
        assert_eq!(progress.pending, 1);
        assert_eq!(progress.unresolved, vec![0, 2, 3, 4]);
        assert!(!progress.complete);
        assert_eq!(progress.checksum_verified, None);
    }
}
