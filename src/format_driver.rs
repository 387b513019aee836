//! Orchestrates a full format: validate, build geometry, build layout, zero
//! the metadata partitions, seed the slab summary, write the super block,
//! and write the geometry last (`spec.md` §2, §4.11).
//!
//! Every step is logged at `info` before it runs and any error is logged at
//! `error` before it is propagated, so the step a failed format got to is
//! visible from the log even though the only on-disk evidence is whether
//! PBN 0 still decodes.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use uuid::Uuid;

use crate::config::{BLOCK_SIZE, FormatConfig, IndexConfig};
use crate::error::Result;
use crate::forest_sizing::{block_map_page_count, compute_logical_blocks};
use crate::geometry::{self, GeometryBlock};
use crate::journal_init;
use crate::layer::Layer;
use crate::layout::{self, VdoLayout};
use crate::slab_config::{self, SlabConfig};
use crate::slab_summary_init::{self, slab_summary_size};
use crate::super_block::{
    RecoveryJournalState, SlabDepotState, SuperBlock, VdoComponent, VdoConfigSnapshot, VdoState,
};

/// Draws a 64-bit nonce from wall-clock time XORed with OS randomness, so
/// two formats issued at the same instant still draw different nonces
/// (`spec.md` §4.11 step 2).
fn draw_nonce() -> u64 {
    let time_component = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos() as u64)
        .unwrap_or(0);
    time_component ^ rand::thread_rng().next_u64()
}

fn draw_uuid() -> [u8; 16] {
    *Uuid::new_v4().as_bytes()
}

/// Derives the `VdoLayout` for the data region, resolving `config.logical_blocks
/// == 0` ("fill the device") to a concrete logical-block count along the way.
///
/// Returns the layout and the logical-block count it was built for.
fn build_layout(
    config: &FormatConfig,
    slab_config: &SlabConfig,
    data_region_offset: u64,
    physical_blocks: u64,
) -> Result<(VdoLayout, u64)> {
    let starting_offset = data_region_offset + 1;
    let slab_summary_blocks = slab_summary_size(BLOCK_SIZE);
    let fixed_tail = u64::from(config.recovery_journal_size) + slab_summary_blocks;

    let logical_blocks = if config.logical_blocks == 0 {
        let available = physical_blocks.saturating_sub(starting_offset).saturating_sub(fixed_tail);
        compute_logical_blocks(available)
    } else {
        config.logical_blocks
    };

    let page_count = block_map_page_count(logical_blocks);
    let layout = layout::make_layout(
        physical_blocks,
        starting_offset,
        page_count,
        slab_config.slab_blocks,
        config.recovery_journal_size,
        slab_summary_blocks,
    )?;

    Ok((layout, logical_blocks))
}

/// Formats `layer` per `config` and `index_config`. On success the device
/// loads as a fresh (`VdoState::New`) VDO volume with an empty recovery
/// journal and every slab marked clean and free.
pub fn format(config: &FormatConfig, index_config: IndexConfig, layer: &mut dyn Layer) -> Result<()> {
    log::info!("validating format configuration against the device");
    let physical_blocks = layer.block_count();
    if let Err(err) = config.validate(physical_blocks) {
        log::error!("format configuration rejected: {err}");
        return Err(err);
    }
    let slab_config = match slab_config::configure_slab(config.slab_size, config.slab_journal_blocks) {
        Ok(slab_config) => slab_config,
        Err(err) => {
            log::error!("slab configuration rejected: {err}");
            return Err(err);
        }
    };

    log::info!("drawing nonce and uuid");
    let nonce = draw_nonce();
    let uuid = draw_uuid();

    log::info!("building volume geometry");
    let geometry = match GeometryBlock::build(nonce, uuid, index_config, physical_blocks) {
        Ok(geometry) => geometry,
        Err(err) => {
            log::error!("geometry construction failed: {err}");
            return Err(err);
        }
    };

    log::info!("clearing the geometry block so a torn format leaves an unrecognisable device");
    geometry::clear_geometry(layer)?;

    log::info!("building the VDO partition layout");
    let (vdo_layout, logical_blocks) = match build_layout(config, &slab_config, geometry.data_partition.starting_offset, physical_blocks) {
        Ok(result) => result,
        Err(err) => {
            log::error!("layout construction failed: {err}");
            return Err(err);
        }
    };
    let slab_count = vdo_layout.slab_count(slab_config.slab_blocks);

    log::info!("clearing the block-map partition ({} blocks)", vdo_layout.block_map.length);
    crate::partition_io::clear_partition(layer, vdo_layout.block_map)?;

    log::info!("clearing the recovery-journal partition ({} blocks)", vdo_layout.recovery_journal.length);
    journal_init::clear_recovery_journal(layer, vdo_layout.recovery_journal)?;

    log::info!("seeding the slab summary for {slab_count} slabs");
    slab_summary_init::seed_slab_summary(layer, vdo_layout.slab_summary, slab_count, BLOCK_SIZE)?;

    log::info!("encoding and writing the super block");
    let super_block = SuperBlock::new(
        RecoveryJournalState::fresh(),
        SlabDepotState {
            first_block: vdo_layout.block_allocator.offset,
            slab_count,
            slab_config,
            zone_count: 1,
        },
        VdoComponent {
            state: VdoState::New,
            nonce,
            config: VdoConfigSnapshot {
                logical_blocks,
                physical_blocks,
                slab_size: config.slab_size,
                slab_journal_blocks: config.slab_journal_blocks,
                recovery_journal_size: config.recovery_journal_size,
            },
            complete_recoveries: 0,
            read_only_recoveries: 0,
        },
    );
    crate::super_block::write_super_block(layer, geometry.data_partition.starting_offset, &super_block)?;

    log::info!("writing geometry — commit point");
    geometry::write_geometry(layer, &geometry)?;

    Ok(())
}
