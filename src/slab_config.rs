//! Per-slab arithmetic: how many of a slab's blocks go to its journal, its
//! reference-count tail, and actual data (`spec.md` §3, §4.5).
//!
//! The exact slab-size range and the minimum-journal-blocks formula are an
//! implementation choice the original C source would have pinned exactly;
//! since that source was not available to ground this crate on, the
//! constants below were chosen to be internally consistent and to satisfy
//! every concrete scenario in `spec.md` §8 (see `DESIGN.md`).

use crate::config::BLOCK_SIZE;
use crate::error::{Result, VdoError};

/// Smallest legal slab size, in blocks (512 KiB at a 4 KiB block size).
pub const MIN_SLAB_SIZE_BLOCKS: u32 = 1 << 7;
/// Largest legal slab size, in blocks (32 GiB at a 4 KiB block size).
pub const MAX_SLAB_SIZE_BLOCKS: u32 = 1 << 23;

/// Bytes of on-disk reference-count storage per data block.
const BYTES_PER_REFCOUNT: u32 = 1;

/// The derived per-slab layout: `journal_blocks + reference_count_blocks +
/// data_blocks == slab_size` (P3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabConfig {
    pub slab_blocks: u32,
    pub journal_blocks: u32,
    pub reference_count_blocks: u32,
    pub data_blocks: u32,
}

/// The smallest legal slab-journal size for a slab of `slab_size` blocks:
/// scales with slab size so bigger slabs get proportionally larger journals,
/// floored at 16 blocks.
pub fn minimum_journal_blocks(slab_size: u32) -> u32 {
    (slab_size / 64).max(16)
}

fn is_power_of_two(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// Derives a `SlabConfig` from a requested slab size and slab-journal size,
/// per `spec.md` §4.5.
pub fn configure_slab(slab_size: u32, journal_blocks: u32) -> Result<SlabConfig> {
    if !is_power_of_two(slab_size) || slab_size < MIN_SLAB_SIZE_BLOCKS || slab_size > MAX_SLAB_SIZE_BLOCKS {
        return Err(VdoError::OutOfRange {
            what: "slab_size",
            value: u64::from(slab_size),
            min: u64::from(MIN_SLAB_SIZE_BLOCKS),
            max: u64::from(MAX_SLAB_SIZE_BLOCKS),
        });
    }

    let minimum_journal = minimum_journal_blocks(slab_size);
    let maximum_journal = slab_size / 2;
    if journal_blocks < minimum_journal || journal_blocks >= maximum_journal {
        return Err(VdoError::OutOfRange {
            what: "slab_journal_blocks",
            value: u64::from(journal_blocks),
            min: u64::from(minimum_journal),
            max: u64::from(maximum_journal) - 1,
        });
    }

    let data_and_refcount_blocks = slab_size - journal_blocks;
    let refcount_bytes = u64::from(data_and_refcount_blocks) * u64::from(BYTES_PER_REFCOUNT);
    let reference_count_blocks = refcount_bytes.div_ceil(u64::from(BLOCK_SIZE)) as u32;

    let data_blocks = data_and_refcount_blocks
        .checked_sub(reference_count_blocks)
        .filter(|&blocks| blocks >= 1)
        .ok_or(VdoError::OutOfRange {
            what: "data_blocks (slab too small once journal and refcount overhead are subtracted)",
            value: 0,
            min: 1,
            max: u64::from(slab_size),
        })?;

    Ok(SlabConfig { slab_blocks: slab_size, journal_blocks, reference_count_blocks, data_blocks })
}
