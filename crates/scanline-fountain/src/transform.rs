//! Payload transforms applied before encoding and after decoding.
//!
//! The engine never calls these itself. Hosts pick a transform, run
//! [`PayloadTransform::forward`] on the dataset, hand the result to the
//! encoder, and run [`PayloadTransform::inverse`] on the decoded bytes.

use crate::error::{FountainError, Result};

pub trait PayloadTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn forward(&self, input: &[u8]) -> Result<Vec<u8>>;

    fn inverse(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl PayloadTransform for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn forward(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }

    fn inverse(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }
}

/// LZ4 block compression with a little-endian `u32` size prefix.
#[derive(Debug, Clone, Copy)]
pub struct Lz4 {
    /// Largest decompressed size `inverse` will allocate.
    pub max_output: usize,
}

impl Default for Lz4 {
    fn default() -> Self {
        Lz4 {
            max_output: crate::config::DEFAULT_MAX_PAYLOAD_BYTES * 16,
        }
    }
}

impl PayloadTransform for Lz4 {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn forward(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(input))
    }

    fn inverse(&self, input: &[u8]) -> Result<Vec<u8>> {
        let Some(prefix) = input.get(..4) else {
            return Err(FountainError::Transform("lz4 input shorter than its size prefix".into()));
        };
        let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if declared > self.max_output {
            return Err(FountainError::Transform(format!(
                "lz4 declares {declared} bytes, limit is {}",
                self.max_output
            )));
        }
        lz4_flex::decompress_size_prepended(input)
            .map_err(|e| FountainError::Transform(format!("lz4 decompression failed: {e}")))
    }
}

/// Look up a transform by its [`PayloadTransform::name`].
pub fn by_name(name: &str) -> Result<Box<dyn PayloadTransform>> {
    match name {
        "identity" | "none" => Ok(Box::new(Identity)),
        "lz4" => Ok(Box::new(Lz4::default())),
        other => Err(FountainError::Transform(format!("unknown transform '{other}'"))),
    }
}
