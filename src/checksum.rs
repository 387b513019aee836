//! CRC-32C (Castagnoli) over metadata blocks.
//!
//! Polynomial 0x1EDC6F41, reflected, init 0xFFFFFFFF, xorout 0xFFFFFFFF —
//! exactly what `crc32c` implements, so this module is a thin, testable
//! wrapper rather than a hand-rolled table.

/// Computes the CRC-32C of `bytes`.
pub fn crc32c(bytes: &[u8]) -> u32 {
    crc32c::crc32c(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Pinned vectors from the standard CRC-32C (Castagnoli) test suite.
    #[test]
    fn empty_input() {
        assert_eq!(crc32c(b""), 0);
    }

    #[test]
    fn known_vector_check() {
        // The canonical "check" string for CRC-32C.
        assert_eq!(crc32c(b"123456789"), 0xE3069283);
    }

    #[test]
    fn deterministic() {
        let data = b"the quick brown fox jumps over the lazy dog";
        assert_eq!(crc32c(data), crc32c(data));
    }

    #[test]
    fn sensitive_to_every_byte() {
        let mut data = *b"deterministic block of metadata";
        let baseline = crc32c(&data);
        data[10] ^= 0x01;
        assert_ne!(crc32c(&data), baseline);
    }
}
