//! The fixed partition table inside the data region (`spec.md` §3, §4.7).
//!
//! Partitions are carved in a fixed order — block map, block allocator,
//! recovery journal, slab summary — each strictly after the previous one,
//! with the block-allocator partition rounded down to a whole number of
//! slabs so the slab depot never straddles a partition boundary (P2).

use crate::error::{Result, VdoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionId {
    BlockMap,
    BlockAllocator,
    RecoveryJournal,
    SlabSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub id: PartitionId,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdoLayout {
    pub block_map: Partition,
    pub block_allocator: Partition,
    pub recovery_journal: Partition,
    pub slab_summary: Partition,
}

impl VdoLayout {
    /// The four partitions in on-disk order, for invariant checks and
    /// iteration over "clear every partition" style operations.
    pub fn partitions(&self) -> [Partition; 4] {
        [self.block_map, self.block_allocator, self.recovery_journal, self.slab_summary]
    }

    /// Number of whole slabs the block-allocator partition holds.
    pub fn slab_count(&self, slab_size: u32) -> u64 {
        self.block_allocator.length / u64::from(slab_size)
    }
}

/// Carves the four data-region partitions starting at `starting_offset`.
///
/// `block_map_page_count` is the page count `forest_sizing::block_map_page_count`
/// already derived from the configured logical-block count; `make_layout`
/// itself does not re-derive it, so it does not need `logical_blocks`.
pub fn make_layout(
    physical_blocks: u64,
    starting_offset: u64,
    block_map_page_count: u64,
    slab_size: u32,
    recovery_journal_size: u32,
    slab_summary_size: u64,
) -> Result<VdoLayout> {
    if starting_offset >= physical_blocks {
        return Err(VdoError::OutOfRange {
            what: "starting_offset",
            value: starting_offset,
            min: 0,
            max: physical_blocks - 1,
        });
    }
    if block_map_page_count == 0 {
        return Err(VdoError::OutOfRange { what: "block_map_page_count", value: 0, min: 1, max: u64::MAX });
    }

    let mut offset = starting_offset;
    let block_map = Partition { id: PartitionId::BlockMap, offset, length: block_map_page_count };
    offset = offset.checked_add(block_map_page_count).ok_or(VdoError::Corrupt("block map partition overflows device"))?;

    let fixed_tail = u64::from(recovery_journal_size) + slab_summary_size;
    let remaining = physical_blocks
        .checked_sub(offset)
        .and_then(|remaining| remaining.checked_sub(fixed_tail))
        .ok_or(VdoError::OutOfRange {
            what: "physical_blocks (too small for block map, recovery journal, and slab summary)",
            value: physical_blocks,
            min: offset + fixed_tail + u64::from(slab_size),
            max: u64::MAX,
        })?;

    let allocator_length = (remaining / u64::from(slab_size)) * u64::from(slab_size);
    if allocator_length == 0 {
        return Err(VdoError::OutOfRange {
            what: "physical_blocks (block allocator would hold zero slabs)",
            value: remaining,
            min: u64::from(slab_size),
            max: u64::MAX,
        });
    }

    let block_allocator = Partition { id: PartitionId::BlockAllocator, offset, length: allocator_length };
    offset += allocator_length;

    let recovery_journal = Partition { id: PartitionId::RecoveryJournal, offset, length: u64::from(recovery_journal_size) };
    offset += u64::from(recovery_journal_size);

    let slab_summary = Partition { id: PartitionId::SlabSummary, offset, length: slab_summary_size };
    offset += slab_summary_size;

    debug_assert!(offset <= physical_blocks);

    Ok(VdoLayout { block_map, block_allocator, recovery_journal, slab_summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layout() -> VdoLayout {
        make_layout(131_072, 1, 61, 8192, 2048, 8).unwrap()
    }

    #[test]
    fn partitions_are_contiguous_and_ordered() {
        let layout = sample_layout();
        let partitions = layout.partitions();
        for window in partitions.windows(2) {
            assert_eq!(window[0].offset + window[0].length, window[1].offset);
        }
    }

    #[test]
    fn partitions_are_within_bounds() {
        let layout = make_layout(131_072, 1, 61, 8192, 2048, 8).unwrap();
        let partitions = layout.partitions();
        let last = partitions.last().unwrap();
        assert!(last.offset + last.length <= 131_072);
        assert_eq!(partitions[0].offset, 1);
    }

    #[test]
    fn block_allocator_is_slab_aligned() {
        let layout = sample_layout();
        assert_eq!(layout.block_allocator.length % 8192, 0);
    }

    #[test]
    fn slab_sums_hold() {
        let layout = sample_layout();
        assert_eq!(layout.slab_count(8192), layout.block_allocator.length / 8192);
        assert!(layout.slab_count(8192) >= 1);
    }

    #[test]
    fn rejects_starting_offset_past_device() {
        assert!(make_layout(100, 100, 61, 8192, 2048, 8).is_err());
    }

    #[test]
    fn rejects_device_too_small_for_one_slab() {
        assert!(make_layout(100, 1, 61, 8192, 2048, 8).is_err());
    }

    #[test]
    fn rejects_zero_block_map_pages() {
        assert!(make_layout(131_072, 1, 0, 8192, 2048, 8).is_err());
    }
}
