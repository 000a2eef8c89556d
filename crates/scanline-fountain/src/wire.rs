//! # Scanline Wire Format
//!
//! One [`Packet`] per visual code. Two interchangeable text framings carry
//! the same field set:
//!
//! ## JSON
//!
//! ```text
//! { "sessionId": "ses_…", "packetId": 7, "k": 5, "totalBytes": 1000,
//!   "blockSize": 200, "checksum": "1c291ca3", "indices": [1, 3],
//!   "data": "<base64>" }
//! ```
//!
//! `k`, `totalBytes`, `blockSize` and `checksum` are session-constant and may
//! be omitted, but only all together.
//!
//! ## Compact
//!
//! `S1` followed by URL-safe unpadded base64 of:
//!
//! ```text
//! +---------+-------+----------------+-----------+---------------------+
//! | ver (8) | flags | sid len | sid  | packet id | [k | total | bsize | crc32 (32)]
//! +---------+-------+----------------+-----------+---------------------+
//! | index count | first index | deltas … | data len | data …          |
//! +-------------+-------------+----------+----------+-----------------+
//! ```
//!
//! All integers except the version, flags and crc32 are QUIC-style VarInts.
//! Indices are strictly increasing, so deltas are always >= 1.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::config::FountainConfig;
use crate::error::{FountainError, Result};
use crate::session::SessionMeta;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Compact framing version.
pub const COMPACT_VERSION: u8 = 1;

/// Text prefix marking compact framing.
pub const COMPACT_PREFIX: &str = "S1";

const FLAG_META: u8 = 0x01;

/// Distinct sessions whose constants the codec remembers.
pub const MAX_TRACKED_SESSIONS: usize = 16;

// ─── VarInt (QUIC-style, RFC 9000 §16) ──────────────────────────────────────

/// A 62-bit variable-length integer encoded in 1, 2, 4, or 8 bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(u64);

impl VarInt {
    /// Maximum representable value: 2^62 - 1.
    pub const MAX: u64 = (1 << 62) - 1;

    #[inline]
    pub fn new(val: u64) -> Option<Self> {
        if val <= Self::MAX {
            Some(VarInt(val))
        } else {
            None
        }
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn encoded_len(self) -> usize {
        if self.0 < 0x40 {
            1
        } else if self.0 < 0x4000 {
            2
        } else if self.0 < 0x4000_0000 {
            4
        } else {
            8
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        match self.encoded_len() {
            1 => buf.put_u8(self.0 as u8),
            2 => buf.put_u16(0x4000 | self.0 as u16),
            4 => buf.put_u32(0x8000_0000 | self.0 as u32),
            _ => buf.put_u64(0xC000_0000_0000_0000 | self.0),
        }
    }

    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if !buf.has_remaining() {
            return None;
        }
        let first = buf.chunk()[0];
        let len = 1usize << (first >> 6);
        if buf.remaining() < len {
            return None;
        }
        let val = match len {
            1 => {
                buf.advance(1);
                (first & 0x3F) as u64
            }
            2 => (buf.get_u16() & 0x3FFF) as u64,
            4 => (buf.get_u32() & 0x3FFF_FFFF) as u64,
            _ => buf.get_u64() & 0x3FFF_FFFF_FFFF_FFFF,
        };
        Some(VarInt(val))
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarInt({})", self.0)
    }
}

impl From<u32> for VarInt {
    fn from(v: u32) -> Self {
        VarInt(v as u64)
    }
}

fn put_varint(buf: &mut BytesMut, val: u64) {
    // Callers only pass u32-sized values or payload lengths.
    VarInt(val.min(VarInt::MAX)).encode(buf);
}

// ─── Framing ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    Json,
    Compact,
}

impl Framing {
    /// Guess the framing of a scanned string.
    pub fn detect(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') {
            Some(Framing::Json)
        } else if trimmed.starts_with(COMPACT_PREFIX) {
            Some(Framing::Compact)
        } else {
            None
        }
    }
}

// ─── Packet ─────────────────────────────────────────────────────────────────

/// One fountain-coded unit, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub session_id: String,
    pub packet_id: u32,
    /// Present on packet 0 and every `metadata_interval`-th packet.
    pub meta: Option<SessionMeta>,
    /// Source blocks XORed into `data`: non-empty, strictly increasing.
    pub indices: Vec<u32>,
    /// XOR of the selected source blocks; exactly one block long.
    pub data: Bytes,
}

impl Packet {
    pub fn degree(&self) -> usize {
        self.indices.len()
    }

    /// Structural checks that need no session context.
    pub(crate) fn check_shape(&self) -> Result<()> {
        if self.session_id.is_empty() {
            return Err(FountainError::malformed("empty sessionId"));
        }
        if self.indices.is_empty() {
            return Err(FountainError::malformed("empty indices"));
        }
        if self.indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FountainError::malformed("indices not strictly increasing"));
        }
        if self.data.is_empty() {
            return Err(FountainError::malformed("empty data"));
        }
        if let Some(meta) = &self.meta {
            meta.validate()?;
            self.check_against(meta)?;
        }
        Ok(())
    }

    /// Range and length checks against known session constants.
    pub fn check_against(&self, meta: &SessionMeta) -> Result<()> {
        if let Some(&max) = self.indices.last() {
            if max >= meta.k {
                return Err(FountainError::malformed(format!(
                    "index {max} out of range for k={}",
                    meta.k
                )));
            }
        }
        if self.data.len() != meta.block_size as usize {
            return Err(FountainError::malformed(format!(
                "data is {} bytes, blockSize is {}",
                self.data.len(),
                meta.block_size
            )));
        }
        Ok(())
    }

    // ── JSON ────────────────────────────────────────────────────────────

    pub fn to_json(&self) -> String {
        let record = PacketRecord {
            session_id: self.session_id.clone(),
            packet_id: self.packet_id,
            k: self.meta.as_ref().map(|m| m.k),
            total_bytes: self.meta.as_ref().map(|m| m.total_bytes),
            block_size: self.meta.as_ref().map(|m| m.block_size),
            checksum: self.meta.as_ref().map(|m| m.checksum.clone()),
            indices: self.indices.clone(),
            data: BASE64.encode(&self.data),
        };
        // A struct of strings and integers always serializes.
        serde_json::to_string(&record).unwrap_or_default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let record: PacketRecord = serde_json::from_str(raw.trim())
            .map_err(|e| FountainError::malformed(format!("invalid JSON record: {e}")))?;
        let meta = match (record.k, record.total_bytes, record.block_size, record.checksum) {
            (Some(k), Some(total_bytes), Some(block_size), Some(checksum)) => Some(SessionMeta {
                k,
                total_bytes,
                block_size,
                checksum: checksum.to_ascii_lowercase(),
            }),
            (None, None, None, None) => None,
            _ => {
                return Err(FountainError::malformed(
                    "session fields must be all present or all absent",
                ))
            }
        };
        let data = BASE64
            .decode(record.data.as_bytes())
            .map_err(|e| FountainError::malformed(format!("data is not base64: {e}")))?;
        let packet = Packet {
            session_id: record.session_id,
            packet_id: record.packet_id,
            meta,
            indices: record.indices,
            data: Bytes::from(data),
        };
        packet.check_shape()?;
        Ok(packet)
    }

    // ── Compact ─────────────────────────────────────────────────────────

    /// Render the compact framing. Fails on a packet that would not parse
    /// back, such as unsorted indices or a checksum that is not a digest.
    pub fn to_compact(&self) -> Result<String> {
        self.check_shape()?;
        let mut buf = BytesMut::with_capacity(32 + self.indices.len() * 2 + self.data.len());
        buf.put_u8(COMPACT_VERSION);
        buf.put_u8(if self.meta.is_some() { FLAG_META } else { 0 });
        put_varint(&mut buf, self.session_id.len() as u64);
        buf.put_slice(self.session_id.as_bytes());
        put_varint(&mut buf, self.packet_id as u64);
        if let Some(meta) = &self.meta {
            put_varint(&mut buf, meta.k as u64);
            put_varint(&mut buf, meta.total_bytes);
            put_varint(&mut buf, meta.block_size as u64);
            let digest = u32::from_str_radix(&meta.checksum, 16)
                .map_err(|_| FountainError::malformed("checksum is not an 8-digit hex digest"))?;
            buf.put_u32(digest);
        }
        put_varint(&mut buf, self.indices.len() as u64);
        let mut prev = 0u32;
        for (n, &idx) in self.indices.iter().enumerate() {
            let delta = if n == 0 { idx } else { idx - prev };
            put_varint(&mut buf, delta as u64);
            prev = idx;
        }
        put_varint(&mut buf, self.data.len() as u64);
        buf.put_slice(&self.data);

        let mut out = String::with_capacity(COMPACT_PREFIX.len() + buf.len().div_ceil(3) * 4);
        out.push_str(COMPACT_PREFIX);
        BASE64_URL.encode_string(&buf, &mut out);
        Ok(out)
    }

    pub fn from_compact(raw: &str) -> Result<Self> {
        let body = raw
            .trim()
            .strip_prefix(COMPACT_PREFIX)
            .ok_or_else(|| FountainError::malformed("missing compact prefix"))?;
        let bytes = BASE64_URL
            .decode(body.as_bytes())
            .map_err(|e| FountainError::malformed(format!("compact body is not base64: {e}")))?;
        let packet = decode_compact_body(&mut bytes.as_slice())
            .ok_or_else(|| FountainError::malformed("truncated or invalid compact record"))?;
        packet.check_shape()?;
        Ok(packet)
    }

    pub fn to_text(&self, framing: Framing) -> Result<String> {
        match framing {
            Framing::Json => Ok(self.to_json()),
            Framing::Compact => self.to_compact(),
        }
    }

    pub fn from_text(raw: &str) -> Result<Self> {
        match Framing::detect(raw) {
            Some(Framing::Json) => Self::from_json(raw),
            Some(Framing::Compact) => Self::from_compact(raw),
            None => Err(FountainError::malformed("unrecognised framing")),
        }
    }
}

fn get_u32_varint(buf: &mut &[u8]) -> Option<u32> {
    u32::try_from(VarInt::decode(buf)?.value()).ok()
}

fn decode_compact_body(buf: &mut &[u8]) -> Option<Packet> {
    if buf.remaining() < 2 {
        return None;
    }
    if buf.get_u8() != COMPACT_VERSION {
        return None;
    }
    let flags = buf.get_u8();

    let sid_len = VarInt::decode(buf)?.value() as usize;
    if buf.remaining() < sid_len {
        return None;
    }
    let session_id = String::from_utf8(buf[..sid_len].to_vec()).ok()?;
    buf.advance(sid_len);
    let packet_id = get_u32_varint(buf)?;

    let meta = if flags & FLAG_META != 0 {
        let k = get_u32_varint(buf)?;
        let total_bytes = VarInt::decode(buf)?.value();
        let block_size = get_u32_varint(buf)?;
        if buf.remaining() < 4 {
            return None;
        }
        let checksum = format!("{:08x}", buf.get_u32());
        Some(SessionMeta {
            k,
            total_bytes,
            block_size,
            checksum,
        })
    } else {
        None
    };

    let count = VarInt::decode(buf)?.value() as usize;
    // Each index costs at least one byte.
    if count > buf.remaining() {
        return None;
    }
    let mut indices = Vec::with_capacity(count);
    let mut prev = 0u32;
    for n in 0..count {
        let delta = get_u32_varint(buf)?;
        let idx = if n == 0 {
            delta
        } else {
            if delta == 0 {
                return None;
            }
            prev.checked_add(delta)?
        };
        indices.push(idx);
        prev = idx;
    }

    let data_len = VarInt::decode(buf)?.value() as usize;
    if buf.remaining() != data_len {
        return None;
    }
    let data = Bytes::copy_from_slice(&buf[..data_len]);
    buf.advance(data_len);

    Some(Packet {
        session_id,
        packet_id,
        meta,
        indices,
        data,
    })
}

/// Untyped JSON shape; only [`Packet::from_json`] looks at it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PacketRecord {
    session_id: String,
    packet_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    indices: Vec<u32>,
    data: String,
}

// ─── Packet Codec ───────────────────────────────────────────────────────────

/// Serializes packets under a size bound and validates scanned ones.
///
/// Remembers the session constants of recently seen sessions, so a later
/// packet that declares different values for the same `sessionId` is
/// rejected, and metadata-less packets are range-checked.
#[derive(Debug)]
pub struct PacketCodec {
    framing: Framing,
    max_packet_bytes: usize,
    known: HashMap<String, SessionMeta>,
    order: VecDeque<String>,
}

impl PacketCodec {
    pub fn new(framing: Framing, max_packet_bytes: usize) -> Self {
        PacketCodec {
            framing,
            max_packet_bytes,
            known: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn from_config(config: &FountainConfig) -> Self {
        Self::new(config.framing, config.max_packet_bytes)
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Render `packet` in this codec's framing.
    ///
    /// Fails with [`FountainError::MalformedPacket`] on a packet that would
    /// not parse back, and with [`FountainError::PacketTooLarge`] above the
    /// transport unit.
    pub fn serialize(&self, packet: &Packet) -> Result<String> {
        packet.check_shape()?;
        let text = packet.to_text(self.framing)?;
        if text.len() > self.max_packet_bytes {
            return Err(FountainError::PacketTooLarge {
                len: text.len(),
                max: self.max_packet_bytes,
            });
        }
        Ok(text)
    }

    /// Parse and validate one scanned string. Either framing is accepted.
    pub fn deserialize(&mut self, raw: &str) -> Result<Packet> {
        if raw.len() > self.max_packet_bytes.saturating_mul(2) {
            return Err(FountainError::malformed(format!(
                "{} bytes is far beyond the transport unit",
                raw.len()
            )));
        }
        let packet = Packet::from_text(raw)?;

        let known = self.known.get(&packet.session_id).cloned();
        match (&packet.meta, known) {
            (Some(declared), Some(known)) if !declared.same_constants(&known) => {
                return Err(FountainError::SessionMismatch {
                    expected: describe(&packet.session_id, &known),
                    found: describe(&packet.session_id, declared),
                });
            }
            (None, Some(known)) => packet.check_against(&known)?,
            (Some(declared), None) => self.remember(&packet.session_id, declared.clone()),
            _ => {}
        }
        Ok(packet)
    }

    /// Session constants seen for `session_id`, if any.
    pub fn known_meta(&self, session_id: &str) -> Option<&SessionMeta> {
        self.known.get(session_id)
    }

    fn remember(&mut self, session_id: &str, meta: SessionMeta) {
        if self.order.len() >= MAX_TRACKED_SESSIONS {
            if let Some(oldest) = self.order.pop_front() {
                self.known.remove(&oldest);
            }
        }
        self.order.push_back(session_id.to_string());
        self.known.insert(session_id.to_string(), meta);
    }
}

fn describe(session_id: &str, meta: &SessionMeta) -> String {
    format!(
        "{session_id}(k={}, totalBytes={}, blockSize={}, checksum={})",
        meta.k, meta.total_bytes, meta.block_size, meta.checksum
    )
}
