//! The chunked zero-fill shared by `journal_init`'s recovery-journal clear
//! and `format_driver`'s block-map clear (`spec.md` §4.8).

use crate::layer::Layer;
use crate::layout::Partition;
use crate::error::Result;

const MAX_CHUNK_BLOCKS: u64 = 4096;

/// The largest power of two that evenly divides `n` (1 if `n` is odd).
fn largest_power_of_two_divisor(n: u64) -> u64 {
    if n == 0 {
        1
    } else {
        1 << n.trailing_zeros()
    }
}

/// Zeroes every block of `partition`, in chunks of up to 4096 blocks. The
/// chunk size is the largest power-of-two divisor of the partition length,
/// capped at 4096, so every chunk write is the same size and every block of
/// the partition is overwritten exactly once. A failed write surfaces
/// immediately; earlier chunks are left written (the geometry block hasn't
/// been written yet at this point in a format, so the device as a whole is
/// still unrecognisable — see `spec.md` §4.8, §4.11).
pub fn clear_partition(layer: &mut dyn Layer, partition: Partition) -> Result<()> {
    let chunk_blocks = largest_power_of_two_divisor(partition.length).min(MAX_CHUNK_BLOCKS);
    let buffer = layer.allocate_io_buffer(chunk_blocks as usize, "clear-partition")?;

    let mut pbn = partition.offset;
    let mut remaining = partition.length;
    while remaining > 0 {
        layer.write(pbn, &buffer)?;
        pbn += chunk_blocks;
        remaining -= chunk_blocks;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MemoryLayer;
    use crate::layout::PartitionId;

    #[test]
    fn largest_divisor_of_power_of_two_is_itself() {
        assert_eq!(largest_power_of_two_divisor(8192), 8192);
    }

    #[test]
    fn largest_divisor_caps_at_4096() {
        assert_eq!(largest_power_of_two_divisor(16384), 4096);
    }

    #[test]
    fn largest_divisor_of_odd_length_is_one() {
        assert_eq!(largest_power_of_two_divisor(2049), 1);
    }

    #[test]
    fn every_block_of_the_partition_is_zeroed() {
        let mut layer = MemoryLayer::new(4096);
        let partition = Partition { id: PartitionId::RecoveryJournal, offset: 10, length: 2048 };
        // seed with non-zero data first
        for pbn in partition.offset..partition.offset + partition.length {
            layer.write(pbn, &[0xFFu8; 4096]).unwrap();
        }
        clear_partition(&mut layer, partition).unwrap();

        let mut buf = vec![0u8; 4096];
        for pbn in partition.offset..partition.offset + partition.length {
            layer.read(pbn, &mut buf).unwrap();
            assert!(buf.iter().all(|&b| b == 0), "block {pbn} was not cleared");
        }
    }

    #[test]
    fn does_not_touch_blocks_outside_the_partition() {
        let mut layer = MemoryLayer::new(4096);
        layer.write(0, &[0xAAu8; 4096]).unwrap();
        let partition = Partition { id: PartitionId::RecoveryJournal, offset: 1, length: 64 };
        clear_partition(&mut layer, partition).unwrap();

        let mut buf = vec![0u8; 4096];
        layer.read(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xAA));
    }
}
