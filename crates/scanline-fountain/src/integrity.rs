//! Whole-payload integrity digest.
//!
//! CRC-32 (ISO-HDLC) rendered as 8 lowercase hex digits. This guards against
//! transcription and assembly errors, not against tampering.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Raw CRC-32 of `bytes`.
pub fn crc32(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

/// Digest string carried in session metadata.
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:08x}", crc32(bytes))
}

/// Whether `bytes` hash to `expected`. Hex case is ignored.
pub fn verify(bytes: &[u8], expected: &str) -> bool {
    checksum(bytes).eq_ignore_ascii_case(expected.trim())
}

/// Whether `s` has the shape of a digest produced by [`checksum`].
pub fn is_well_formed(s: &str) -> bool {
    s.len() == 8 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // Standard CRC-32 check value.
        assert_eq!(checksum(b"123456789"), "cbf43926");
    }

    #[test]
    fn verify_accepts_uppercase() {
        assert!(verify(b"123456789", "CBF43926"));
        assert!(!verify(b"123456780", "cbf43926"));
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(checksum(b"ab"), checksum(b"ba"));
    }

    #[test]
    fn well_formed_digest_shape() {
        assert!(is_well_formed(&checksum(b"x")));
        assert!(!is_well_formed("xyz"));
        assert!(!is_well_formed("cbf4392g"));
    }
}
