//! The configuration surface `format_driver::format` accepts (`spec.md` §6).
//!
//! Parsing size units or `"0.25/0.5/0.75"`-style memory strings is a CLI
//! concern and stays out of scope (`spec.md` §9, open question); this module
//! only defines the already-resolved values the driver consumes.

use crate::error::{Result, VdoError};

/// Bytes in one on-disk block, fixed for this format revision.
pub const BLOCK_SIZE: u32 = 4096;

/// One UDS dedup-index memory class. `Gb(0)` is rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryClass {
    Mb256,
    Mb512,
    Mb768,
    Gb(u32),
}

impl MemoryClass {
    pub fn gb(n: u32) -> Result<Self> {
        if n == 0 {
            return Err(VdoError::OutOfRange { what: "index memory class (GB)", value: 0, min: 1, max: u32::MAX as u64 });
        }
        Ok(MemoryClass::Gb(n))
    }

    fn memory_bytes(self) -> u64 {
        match self {
            MemoryClass::Mb256 => 256 * 1024 * 1024,
            MemoryClass::Mb512 => 512 * 1024 * 1024,
            MemoryClass::Mb768 => 768 * 1024 * 1024,
            MemoryClass::Gb(n) => u64::from(n) * 1024 * 1024 * 1024,
        }
    }

    /// Blocks of on-disk index region per byte of index memory. A sparse
    /// index trades ten times the on-disk footprint for the same memory
    /// footprint (the documented UDS sparse/dense tradeoff), so it gets a
    /// 10x multiplier here.
    const DENSE_BLOCKS_PER_MEMORY_BYTE_NUM: u64 = 1;
    const DENSE_BLOCKS_PER_MEMORY_BYTE_DEN: u64 = 64 * 1024;
    const SPARSE_MULTIPLIER: u64 = 10;

    /// Length, in blocks, of the dedup-index partition for this memory class.
    pub fn index_region_blocks(self, sparse: bool) -> u64 {
        let memory_bytes = self.memory_bytes();
        let blocks = memory_bytes * Self::DENSE_BLOCKS_PER_MEMORY_BYTE_NUM / Self::DENSE_BLOCKS_PER_MEMORY_BYTE_DEN;
        let blocks = blocks.max(1);
        if sparse {
            blocks * Self::SPARSE_MULTIPLIER
        } else {
            blocks
        }
    }
}

/// The dedup-index configuration carried in `VolumeGeometry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    pub memory_class: MemoryClass,
    pub checkpoint_frequency: u32,
    pub sparse: bool,
}

/// The configuration surface accepted by `format_driver::format`, exactly
/// the fields of `spec.md` §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatConfig {
    /// Must equal the layer's block count if non-zero; 0 means "use the
    /// device's actual size".
    pub physical_blocks: u64,
    /// 0 means "derive the maximum logical capacity the layout supports".
    pub logical_blocks: u64,
    pub slab_size: u32,
    pub slab_journal_blocks: u32,
    pub recovery_journal_size: u32,
}

impl FormatConfig {
    /// Validates `self` against the block count the layer actually reports.
    /// Slab-size and slab-journal-size legality are `slab_config`'s job, not
    /// duplicated here.
    pub fn validate(&self, device_blocks: u64) -> Result<()> {
        if self.physical_blocks != 0 && self.physical_blocks != device_blocks {
            return Err(VdoError::OutOfRange {
                what: "physical_blocks",
                value: self.physical_blocks,
                min: device_blocks,
                max: device_blocks,
            });
        }
        if self.recovery_journal_size == 0 {
            return Err(VdoError::OutOfRange {
                what: "recovery_journal_size",
                value: 0,
                min: 1,
                max: u64::from(u32::MAX),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_gb_class() {
        assert!(MemoryClass::gb(0).is_err());
    }

    #[test]
    fn sparse_index_is_ten_times_larger() {
        let dense = MemoryClass::Mb256.index_region_blocks(false);
        let sparse = MemoryClass::Mb256.index_region_blocks(true);
        assert_eq!(sparse, dense * 10);
    }

    #[test]
    fn validate_rejects_mismatched_physical_blocks() {
        let config = FormatConfig { physical_blocks: 100, logical_blocks: 0, slab_size: 8192, slab_journal_blocks: 224, recovery_journal_size: 2048 };
        assert!(config.validate(200).is_err());
    }

    #[test]
    fn validate_accepts_zero_physical_blocks_as_use_device() {
        let config = FormatConfig { physical_blocks: 0, logical_blocks: 0, slab_size: 8192, slab_journal_blocks: 224, recovery_journal_size: 2048 };
        assert!(config.validate(200).is_ok());
    }

    #[test]
    fn validate_rejects_zero_recovery_journal_size() {
        let config = FormatConfig { physical_blocks: 0, logical_blocks: 0, slab_size: 8192, slab_journal_blocks: 224, recovery_journal_size: 0 };
        assert!(matches!(config.validate(200), Err(VdoError::OutOfRange { what: "recovery_journal_size", .. })));
    }
}
