//! Source block splitting and reassembly.

use bytes::{Bytes, BytesMut};

use crate::error::{FountainError, Result};

/// Number of blocks needed for `total_bytes` at `block_size`.
pub fn block_count(total_bytes: usize, block_size: usize) -> usize {
    total_bytes.div_ceil(block_size)
}

/// Split `payload` into exactly `ceil(len / block_size)` blocks of
/// `block_size` bytes, zero-padding the last one.
///
/// Fails with [`FountainError::PayloadTooSmall`] below `min_payload_bytes`.
pub fn split_blocks(payload: &[u8], block_size: usize, min_payload_bytes: usize) -> Result<Vec<Bytes>> {
    let min = min_payload_bytes.max(1);
    if payload.len() < min {
        return Err(FountainError::PayloadTooSmall {
            len: payload.len(),
            min,
        });
    }
    if block_size == 0 {
        return Err(FountainError::InvalidConfig("block_size must be > 0".into()));
    }

    let blocks = payload
        .chunks(block_size)
        .map(|chunk| {
            if chunk.len() == block_size {
                Bytes::copy_from_slice(chunk)
            } else {
                let mut padded = BytesMut::zeroed(block_size);
                padded[..chunk.len()].copy_from_slice(chunk);
                padded.freeze()
            }
        })
        .collect();
    Ok(blocks)
}

/// Concatenate blocks in index order and truncate to `total_bytes`.
///
/// The padding length is never inferred from content.
pub fn join_blocks<B: AsRef<[u8]>>(blocks: &[B], total_bytes: usize) -> Bytes {
    let mut out = BytesMut::with_capacity(blocks.iter().map(|b| b.as_ref().len()).sum());
    for block in blocks {
        out.extend_from_slice(block.as_ref());
    }
    out.truncate(total_bytes);
    out.freeze()
}
