//! # Transfer Sessions
//!
//! A session is one encode invocation. Its constants (`k`, `total_bytes`,
//! `block_size`, `checksum`) are fixed before the first packet is produced
//! and travel on the wire as [`SessionMeta`].
//!
//! ```text
//!   (no decoder) ──first packet with meta──▶ Collecting ──|resolved| = k──▶ Complete
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{FountainError, Result};
use crate::integrity;
use crate::splitter::block_count;

// ─── Session Meta ───────────────────────────────────────────────────────────

/// Session-constant fields. Optional on individual packets, but all four
/// travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub k: u32,
    pub total_bytes: u64,
    pub block_size: u32,
    pub checksum: String,
}

impl SessionMeta {
    /// Check the `k = ceil(total_bytes / block_size)` invariant and field shapes.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.block_size == 0 || self.total_bytes == 0 {
            return Err(FountainError::malformed("session fields must be non-zero"));
        }
        let expected = block_count(self.total_bytes as usize, self.block_size as usize);
        if expected != self.k as usize {
            return Err(FountainError::malformed(format!(
                "k={} inconsistent with totalBytes={} blockSize={}",
                self.k, self.total_bytes, self.block_size
            )));
        }
        if !integrity::is_well_formed(&self.checksum) {
            return Err(FountainError::malformed("checksum is not an 8-digit hex digest"));
        }
        Ok(())
    }

    /// Equality with the checksum's hex case ignored.
    pub fn same_constants(&self, other: &SessionMeta) -> bool {
        self.k == other.k
            && self.total_bytes == other.total_bytes
            && self.block_size == other.block_size
            && self.checksum.eq_ignore_ascii_case(&other.checksum)
    }
}

// ─── Session ────────────────────────────────────────────────────────────────

/// One transfer instance. Immutable once encoding starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub k: u32,
    pub total_bytes: u64,
    pub block_size: u32,
    pub checksum: String,
}

impl Session {
    pub fn from_meta(session_id: impl Into<String>, meta: SessionMeta) -> Result<Self> {
        let session_id = session_id.into();
        if session_id.is_empty() {
            return Err(FountainError::malformed("empty sessionId"));
        }
        meta.validate()?;
        Ok(Session {
            session_id,
            k: meta.k,
            total_bytes: meta.total_bytes,
            block_size: meta.block_size,
            checksum: meta.checksum.to_ascii_lowercase(),
        })
    }

    pub fn meta(&self) -> SessionMeta {
        SessionMeta {
            k: self.k,
            total_bytes: self.total_bytes,
            block_size: self.block_size,
            checksum: self.checksum.clone(),
        }
    }

    /// Seed mixed into every packet's sampler seed.
    pub fn seed(&self) -> u32 {
        integrity::crc32(self.session_id.as_bytes())
    }

    pub fn k(&self) -> usize {
        self.k as usize
    }

    pub fn block_size(&self) -> usize {
        self.block_size as usize
    }
}
