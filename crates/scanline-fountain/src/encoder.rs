//! # Fountain Encoder
//!
//! Splits a payload into `k` source blocks once, then produces any packet on
//! demand. [`FountainEncoder::encode`] is a pure function of the packet id:
//! no hidden counters, so frames can be rendered out of order or from several
//! threads at once.
//!
//! With the systematic prefix enabled, packet ids `0..k` carry source block
//! `packet_id` verbatim; every later id XORs a sampled set of blocks.

use bytes::{Bytes, BytesMut};
use tracing::info;

use crate::config::FountainConfig;
use crate::error::{FountainError, Result};
use crate::ids;
use crate::integrity;
use crate::sampler::DegreeSampler;
use crate::session::Session;
use crate::splitter::split_blocks;
use crate::wire::Packet;

pub struct FountainEncoder {
    session: Session,
    blocks: Vec<Bytes>,
    sampler: DegreeSampler,
    systematic: bool,
    metadata_interval: u32,
}

impl FountainEncoder {
    /// Start a session with a fresh `ses_` id.
    pub fn new(payload: &[u8], config: &FountainConfig) -> Result<Self> {
        Self::with_session_id(payload, config, ids::session_id())
    }

    /// Start a session under a caller-chosen id (tests, replays).
    pub fn with_session_id(
        payload: &[u8],
        config: &FountainConfig,
        session_id: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        if payload.len() > config.max_payload_bytes {
            return Err(FountainError::PayloadTooLarge {
                len: payload.len(),
                max: config.max_payload_bytes,
            });
        }
        let blocks = split_blocks(payload, config.block_size, config.min_payload_bytes)?;
        let session_id = session_id.into();
        if session_id.is_empty() {
            return Err(FountainError::InvalidConfig("session id must not be empty".into()));
        }

        let session = Session {
            session_id,
            k: blocks.len() as u32,
            total_bytes: payload.len() as u64,
            block_size: config.block_size as u32,
            checksum: integrity::checksum(payload),
        };
        let sampler = DegreeSampler::new(
            blocks.len(),
            session.seed(),
            config.max_degree,
            config.degree_one_weight,
        );

        info!(
            session_id = %session.session_id,
            k = session.k,
            total_bytes = session.total_bytes,
            checksum = %session.checksum,
            "fountain session started"
        );

        Ok(FountainEncoder {
            session,
            blocks,
            sampler,
            systematic: config.systematic,
            metadata_interval: config.metadata_interval,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn k(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Bytes] {
        &self.blocks
    }

    /// Source blocks combined into `packet_id`.
    pub fn indices_for(&self, packet_id: u32) -> Vec<u32> {
        if self.systematic && (packet_id as usize) < self.blocks.len() {
            vec![packet_id]
        } else {
            self.sampler.sample(packet_id)
        }
    }

    /// Whether `packet_id` carries the session constants.
    pub fn carries_meta(&self, packet_id: u32) -> bool {
        packet_id % self.metadata_interval == 0
    }

    /// Build packet `packet_id`.
    pub fn encode(&self, packet_id: u32) -> Packet {
        let indices = self.indices_for(packet_id);
        let data = xor_blocks(&self.blocks, &indices, self.session.block_size());
        Packet {
            session_id: self.session.session_id.clone(),
            packet_id,
            meta: self.carries_meta(packet_id).then(|| self.session.meta()),
            indices,
            data,
        }
    }

    /// Packets `0..count`.
    pub fn packets(&self, count: u32) -> impl Iterator<Item = Packet> + '_ {
        (0..count).map(move |id| self.encode(id))
    }
}

/// XOR of `blocks[i]` over `indices`.
pub fn xor_blocks(blocks: &[Bytes], indices: &[u32], block_size: usize) -> Bytes {
    if let [single] = indices {
        return blocks[*single as usize].clone();
    }
    let mut out = BytesMut::zeroed(block_size);
    for &i in indices {
        xor_into(&mut out, &blocks[i as usize]);
    }
    out.freeze()
}

/// `dst ^= src` over the common prefix.
pub(crate) fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn session_describes_payload() {
        let data = payload(1000);
        let enc = FountainEncoder::with_session_id(&data, &FountainConfig::default(), "ses_a").unwrap();
        let s = enc.session();
        assert_eq!(s.k, 5);
        assert_eq!(s.total_bytes, 1000);
        assert_eq!(s.block_size, 200);
        assert_eq!(s.checksum, integrity::checksum(&data));
        assert!(s.meta().validate().is_ok());
    }

    #[test]
    fn generated_session_ids_are_prefixed() {
        let enc = FountainEncoder::new(&payload(600), &FountainConfig::default()).unwrap();
        assert!(enc.session().session_id.starts_with("ses_"));
    }

    #[test]
    fn payload_bounds_are_enforced() {
        let cfg = FountainConfig::default();
        assert!(matches!(
            FountainEncoder::new(&payload(10), &cfg),
            Err(FountainError::PayloadTooSmall { len: 10, min: 256 })
        ));
        let cfg = FountainConfig {
            max_payload_bytes: 300,
            ..FountainConfig::default()
        };
        assert!(matches!(
            FountainEncoder::new(&payload(301), &cfg),
            Err(FountainError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let cfg = FountainConfig {
            metadata_interval: 0,
            ..FountainConfig::default()
        };
        assert!(matches!(
            FountainEncoder::new(&payload(1000), &cfg),
            Err(FountainError::InvalidConfig(_))
        ));
        let cfg = FountainConfig {
            degree_one_weight: 1.5,
            ..FountainConfig::default()
        };
        assert!(matches!(
            FountainEncoder::with_session_id(&payload(1000), &cfg, "ses_w"),
            Err(FountainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn systematic_prefix_carries_source_blocks() {
        let data = payload(1000);
        let enc = FountainEncoder::with_session_id(&data, &FountainConfig::default(), "ses_a").unwrap();
        for id in 0..5u32 {
            let pkt = enc.encode(id);
            assert_eq!(pkt.indices, vec![id]);
            let start = id as usize * 200;
            assert_eq!(&pkt.data[..], &data[start..start + 200]);
        }
    }

    #[test]
    fn data_is_xor_of_selected_blocks() {
        let data = payload(2000);
        let enc = FountainEncoder::with_session_id(&data, &FountainConfig::default(), "ses_x").unwrap();
        for id in 10..60u32 {
            let pkt = enc.encode(id);
            let mut expected = vec![0u8; 200];
            for &i in &pkt.indices {
                xor_into(&mut expected, &enc.blocks()[i as usize]);
            }
            assert_eq!(&pkt.data[..], &expected[..]);
        }
    }

    #[test]
    fn encode_is_pure() {
        let data = payload(3000);
        let enc = FountainEncoder::with_session_id(&data, &FountainConfig::default(), "ses_p").unwrap();
        let later = enc.encode(40);
        let _ = enc.packets(40).count();
        assert_eq!(enc.encode(40), later);
    }

    #[test]
    fn metadata_interval_controls_session_fields() {
        let cfg = FountainConfig {
            metadata_interval: 3,
            ..FountainConfig::default()
        };
        let enc = FountainEncoder::with_session_id(&payload(1000), &cfg, "ses_m").unwrap();
        let with_meta: Vec<u32> = enc
            .packets(8)
            .filter(|p| p.meta.is_some())
            .map(|p| p.packet_id)
            .collect();
        assert_eq!(with_meta, vec![0, 3, 6]);
    }

    #[test]
    fn non_systematic_samples_from_the_start() {
        let cfg = FountainConfig {
            systematic: false,
            ..FountainConfig::default()
        };
        let enc = FountainEncoder::with_session_id(&payload(4000), &cfg, "ses_n").unwrap();
        let multi = (0..20u32).any(|id| enc.encode(id).degree() > 1);
        assert!(multi);
    }
}
