//! Out-of-band super-block state mutation: `force-rebuild` and `read-only`
//! (`spec.md` §4.10). The only mutation this crate performs after a volume
//! has been formatted — it touches exactly one block.

use crate::error::{Result, VdoError};
use crate::geometry;
use crate::layer::Layer;
use crate::super_block::{self, VdoState};

/// Loads the geometry and super block, checks `require_read_only` against
/// the current state, sets `new_state`, and writes the super block back.
pub fn update_super_block_state(layer: &mut dyn Layer, require_read_only: bool, new_state: VdoState) -> Result<()> {
    let geometry = geometry::load_geometry(layer)?;
    let mut current = super_block::load_super_block(layer, geometry.data_partition.starting_offset)?;

    if require_read_only && current.component.state != VdoState::ReadOnlyMode {
        return Err(VdoError::NotReadOnly { state: current.component.state });
    }

    current.component.state = new_state;
    super_block::write_super_block(layer, geometry.data_partition.starting_offset, &current)
}

/// `vdoforcerebuild`-equivalent: requires the volume to already be in
/// `READ_ONLY_MODE`.
pub fn force_rebuild(layer: &mut dyn Layer) -> Result<()> {
    update_super_block_state(layer, true, VdoState::ForceRebuild)
}

/// `vdoreadonly`-equivalent: marks a volume read-only unconditionally.
pub fn set_read_only(layer: &mut dyn Layer) -> Result<()> {
    update_super_block_state(layer, false, VdoState::ReadOnlyMode)
}
