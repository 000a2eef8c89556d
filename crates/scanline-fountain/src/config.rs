//! Engine configuration.
//!
//! Parsed in two layers: a lenient [`FountainConfigInput`] deserialized from
//! TOML where every field is optional, then [`FountainConfigInput::resolve`]
//! fills defaults and validates into a [`FountainConfig`].

use serde::Deserialize;

use crate::error::{FountainError, Result};
use crate::planner::RedundancyPolicy;
use crate::sampler::DEFAULT_MAX_DEGREE;
use crate::wire::Framing;

pub const CONFIG_VERSION: u32 = 1;

/// Source block size. A one-block packet stays well under a 2000-byte
/// transport unit after base64 and framing.
pub const DEFAULT_BLOCK_SIZE: usize = 200;

/// Payloads below this size should use a direct transfer instead.
pub const DEFAULT_MIN_PAYLOAD_BYTES: usize = 256;

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Reference capacity of one visual code.
pub const DEFAULT_MAX_PACKET_BYTES: usize = 2000;

pub const DEFAULT_DEGREE_ONE_WEIGHT: f64 = 0.2;

// ─── Input layer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FountainConfigInput {
    pub version: u32,
    pub block_size: Option<usize>,
    pub min_payload_bytes: Option<usize>,
    pub max_payload_bytes: Option<usize>,
    pub max_packet_bytes: Option<usize>,
    pub degree_one_weight: Option<f64>,
    pub max_degree: Option<usize>,
    pub systematic: Option<bool>,
    pub metadata_interval: Option<u32>,
    pub elimination: Option<bool>,
    pub framing: Option<Framing>,
    pub orphan_capacity: Option<usize>,
    pub redundancy: RedundancyInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedundancyInput {
    pub small_factor: Option<f64>,
    pub large_factor: Option<f64>,
    pub threshold: Option<u32>,
}

// ─── Resolved config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FountainConfig {
    pub version: u32,
    /// Fixed size of every source block.
    pub block_size: usize,
    pub min_payload_bytes: usize,
    pub max_payload_bytes: usize,
    /// Upper bound on one serialized packet.
    pub max_packet_bytes: usize,
    /// Probability mass given to degree 1 by the sampler.
    pub degree_one_weight: f64,
    /// Cap on sampled degrees.
    pub max_degree: usize,
    /// Packet ids below `k` carry one source block each.
    pub systematic: bool,
    /// Session fields ride on packet 0 and every Nth packet after it.
    pub metadata_interval: u32,
    /// Fall back to GF(2) elimination when peeling stalls.
    pub elimination: bool,
    pub framing: Framing,
    /// Packets held by the receiver while session metadata is unknown.
    pub orphan_capacity: usize,
    pub redundancy: RedundancyPolicy,
}

impl Default for FountainConfig {
    fn default() -> Self {
        FountainConfig {
            version: CONFIG_VERSION,
            block_size: DEFAULT_BLOCK_SIZE,
            min_payload_bytes: DEFAULT_MIN_PAYLOAD_BYTES,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
            degree_one_weight: DEFAULT_DEGREE_ONE_WEIGHT,
            max_degree: DEFAULT_MAX_DEGREE,
            systematic: true,
            metadata_interval: 1,
            elimination: true,
            framing: Framing::Json,
            orphan_capacity: 64,
            redundancy: RedundancyPolicy::default(),
        }
    }
}

impl FountainConfigInput {
    pub fn resolve(self) -> Result<FountainConfig> {
        let defaults = FountainConfig::default();
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(FountainError::InvalidConfig(format!(
                "unsupported config version {version}"
            )));
        }

        let redundancy = RedundancyPolicy {
            small_factor: self
                .redundancy
                .small_factor
                .unwrap_or(defaults.redundancy.small_factor),
            large_factor: self
                .redundancy
                .large_factor
                .unwrap_or(defaults.redundancy.large_factor),
            threshold: self
                .redundancy
                .threshold
                .unwrap_or(defaults.redundancy.threshold),
        };

        let config = FountainConfig {
            version,
            block_size: self.block_size.unwrap_or(defaults.block_size),
            min_payload_bytes: self.min_payload_bytes.unwrap_or(defaults.min_payload_bytes),
            max_payload_bytes: self.max_payload_bytes.unwrap_or(defaults.max_payload_bytes),
            max_packet_bytes: self.max_packet_bytes.unwrap_or(defaults.max_packet_bytes),
            degree_one_weight: self.degree_one_weight.unwrap_or(defaults.degree_one_weight),
            max_degree: self.max_degree.unwrap_or(defaults.max_degree),
            systematic: self.systematic.unwrap_or(defaults.systematic),
            metadata_interval: self.metadata_interval.unwrap_or(defaults.metadata_interval),
            elimination: self.elimination.unwrap_or(defaults.elimination),
            framing: self.framing.unwrap_or(defaults.framing),
            orphan_capacity: self.orphan_capacity.unwrap_or(defaults.orphan_capacity),
            redundancy,
        };
        config.validate()?;
        Ok(config)
    }
}

impl FountainConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(FountainConfig::default());
        }
        let parsed: FountainConfigInput = toml::from_str(input)
            .map_err(|e| FountainError::InvalidConfig(format!("invalid config TOML: {e}")))?;
        parsed.resolve()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FountainError::InvalidConfig(msg));
        if self.block_size == 0 {
            return invalid("block_size must be > 0".into());
        }
        // A single base64-encoded block must fit before any framing is added.
        if self.block_size.div_ceil(3) * 4 >= self.max_packet_bytes {
            return invalid(format!(
                "block_size {} cannot fit a {}-byte packet",
                self.block_size, self.max_packet_bytes
            ));
        }
        if self.min_payload_bytes == 0 || self.min_payload_bytes > self.max_payload_bytes {
            return invalid(format!(
                "payload bounds {}..={} are empty",
                self.min_payload_bytes, self.max_payload_bytes
            ));
        }
        if !(self.degree_one_weight > 0.0 && self.degree_one_weight <= 1.0) {
            return invalid(format!(
                "degree_one_weight {} must lie in (0, 1]",
                self.degree_one_weight
            ));
        }
        if self.max_degree == 0 {
            return invalid("max_degree must be >= 1".into());
        }
        if self.metadata_interval == 0 {
            return invalid("metadata_interval must be >= 1".into());
        }
        self.redundancy.validate()
    }
}
