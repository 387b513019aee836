//! Seeding the recovery-journal partition for a fresh volume (`spec.md` §2,
//! §4.11 step 8).
//!
//! A freshly formatted volume has an empty recovery journal: there is
//! nothing to replay, so the partition is simply zeroed. `super_block`
//! separately encodes the journal's `{head, tail}` sequence numbers as
//! `{1, 1}`; this module only owns the on-disk partition contents.

use crate::error::Result;
use crate::layer::Layer;
use crate::layout::Partition;
use crate::partition_io::clear_partition;

/// Zeroes the recovery-journal partition.
pub fn clear_recovery_journal(layer: &mut dyn Layer, partition: Partition) -> Result<()> {
    clear_partition(layer, partition)
}
