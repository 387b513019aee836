//! Sizing and seeding the slab-summary partition (`spec.md` §3, §4.8).
//!
//! The slab summary is a flat table, one small entry per slab, read in full
//! at load time so the block allocator knows roughly how full every slab is
//! before it has replayed anything. It is always sized for the largest
//! number of slabs this format revision supports, not the number of slabs
//! actually in the depot, so growing a volume's slab count later never
//! requires relocating the partition.

use crate::error::Result;
use crate::layer::Layer;
use crate::layout::Partition;

/// Largest slab count this format revision's slab summary can describe.
pub const MAX_SLABS: u64 = 8192;

/// Bytes per on-disk entry: a 2-byte free-block hint, a 1-byte flags field
/// (bit 0 = clean), and one reserved byte.
const ENTRY_SIZE_BYTES: u64 = 4;

const FLAG_CLEAN: u8 = 0x1;

/// Blocks needed for a slab-summary table covering `MAX_SLABS` slabs at
/// `block_size`-byte blocks.
pub fn slab_summary_size(block_size: u32) -> u64 {
    let entries_per_block = u64::from(block_size) / ENTRY_SIZE_BYTES;
    MAX_SLABS.div_ceil(entries_per_block)
}

/// Writes one "fully free, clean" entry per slab in `0..slab_count`, leaving
/// the remaining (never-allocated) entry slots zeroed.
pub fn seed_slab_summary(layer: &mut dyn Layer, partition: Partition, slab_count: u64, block_size: u32) -> Result<()> {
    let mut buffer = layer.allocate_io_buffer(partition.length as usize, "slab-summary-seed")?;

    for slab_idx in 0..slab_count {
        let byte_offset = (slab_idx * ENTRY_SIZE_BYTES) as usize;
        buffer[byte_offset..byte_offset + 2].copy_from_slice(&0u16.to_le_bytes()); // zero blocks used
        buffer[byte_offset + 2] = FLAG_CLEAN;
        buffer[byte_offset + 3] = 0;
    }

    let _ = block_size; // entry layout is block-size independent; kept for API symmetry with slab_summary_size
    layer.write(partition.offset, &buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BLOCK_SIZE;
    use crate::layer::MemoryLayer;
    use crate::layout::PartitionId;

    #[test]
    fn size_covers_max_slabs() {
        let size = slab_summary_size(BLOCK_SIZE);
        let entries_per_block = u64::from(BLOCK_SIZE) / ENTRY_SIZE_BYTES;
        assert!(size * entries_per_block >= MAX_SLABS);
    }

    #[test]
    fn seeded_entries_mark_slabs_clean_and_free() {
        let mut layer = MemoryLayer::new(4096);
        let size = slab_summary_size(BLOCK_SIZE);
        let partition = Partition { id: PartitionId::SlabSummary, offset: 32, length: size };
        seed_slab_summary(&mut layer, partition, 10, BLOCK_SIZE).unwrap();

        let mut buf = vec![0u8; (size * u64::from(BLOCK_SIZE)) as usize];
        for (i, chunk) in buf.chunks_mut(BLOCK_SIZE as usize).enumerate() {
            layer.read(partition.offset + i as u64, chunk).unwrap();
        }

        for slab_idx in 0..10u64 {
            let offset = (slab_idx * ENTRY_SIZE_BYTES) as usize;
            assert_eq!(u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap()), 0);
            assert_eq!(buf[offset + 2] & FLAG_CLEAN, FLAG_CLEAN);
        }
    }

    #[test]
    fn entries_past_slab_count_stay_zeroed() {
        let mut layer = MemoryLayer::new(4096);
        let size = slab_summary_size(BLOCK_SIZE);
        let partition = Partition { id: PartitionId::SlabSummary, offset: 32, length: size };
        seed_slab_summary(&mut layer, partition, 2, BLOCK_SIZE).unwrap();

        let mut buf = vec![0u8; BLOCK_SIZE as usize];
        layer.read(partition.offset, &mut buf).unwrap();
        let unused_entry_offset = (5 * ENTRY_SIZE_BYTES) as usize;
        assert!(buf[unused_entry_offset..unused_entry_offset + 4].iter().all(|&b| b == 0));
    }
}
