//! Fixed-width little-endian encode/decode of the header every on-disk
//! record carries, plus the shared validation every `load_*` call runs
//! before touching its payload.
//!
//! Records are not transmuted from raw bytes (`repr(C)` + pointer cast):
//! every field is written/read through `bytes::BufMut`/`Buf` so the wire
//! format is exact regardless of host endianness or struct padding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, VdoError};
use crate::version;

/// The `{id, major, minor, size}` prefix every encodable record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub id: u32,
    pub major: u32,
    pub minor: u32,
    /// Total encoded size of the record, header included.
    pub size: u32,
}

pub const HEADER_SIZE: usize = 16;

impl Header {
    pub fn new(id: u32, size: u32) -> Self {
        Self { id, major: version::CURRENT_MAJOR, minor: version::CURRENT_MINOR, size }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_u32_le(self.major);
        buf.put_u32_le(self.minor);
        buf.put_u32_le(self.size);
    }

    pub fn decode(buf: &mut Bytes) -> Self {
        let id = buf.get_u32_le();
        let major = buf.get_u32_le();
        let minor = buf.get_u32_le();
        let size = buf.get_u32_le();
        Self { id, major, minor, size }
    }

    /// Validates `self` against the `id` the caller expected to find and the
    /// number of bytes actually available in the decode buffer, per
    /// `spec.md` §4.2: `INCORRECT_COMPONENT` on an id mismatch,
    /// `UNSUPPORTED_VERSION` on a version not in the release table, and
    /// `BAD_LENGTH` if the declared size disagrees with what's available.
    pub fn validate(&self, expected_id: u32, available: usize) -> Result<()> {
        if self.id != expected_id {
            return Err(VdoError::IncorrectComponent { expected: expected_id, found: self.id });
        }
        if !version::is_supported_version(self.major, self.minor) {
            return Err(VdoError::UnsupportedVersion { id: self.id, major: self.major, minor: self.minor });
        }
        if self.size as usize > available {
            return Err(VdoError::BadLength { declared: self.size, actual: available });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = Header::new(42, 128);
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);
        let mut frozen = buf.freeze();
        assert_eq!(Header::decode(&mut frozen), header);
    }

    #[test]
    fn rejects_wrong_component_id() {
        let header = Header::new(42, 128);
        assert!(matches!(
            header.validate(43, 128),
            Err(VdoError::IncorrectComponent { expected: 43, found: 42 })
        ));
    }

    #[test]
    fn rejects_unsupported_minor() {
        let header = Header { id: 5, major: version::CURRENT_MAJOR, minor: version::CURRENT_MINOR + 1, size: 16 };
        assert!(matches!(header.validate(5, 16), Err(VdoError::UnsupportedVersion { .. })));
    }

    #[test]
    fn rejects_short_buffer() {
        let header = Header::new(5, 4096);
        assert!(matches!(header.validate(5, 100), Err(VdoError::BadLength { declared: 4096, actual: 100 })));
    }
}
