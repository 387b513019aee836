//! End-to-end format against a real file-backed `FileLayer`, exercising
//! the full `format_driver::format` → `geometry`/`super_block` load path
//! without the in-memory test layer the unit tests use.

use std::io::Write;

use vdo_format::config::{FormatConfig, IndexConfig, MemoryClass};
use vdo_format::format_driver::format;
use vdo_format::geometry::load_geometry;
use vdo_format::layer::FileLayer;
use vdo_format::reconfigure::{force_rebuild, set_read_only};
use vdo_format::super_block::{load_super_block, VdoState};

fn sample_config() -> FormatConfig {
    FormatConfig { physical_blocks: 0, logical_blocks: 0, slab_size: 8192, slab_journal_blocks: 224, recovery_journal_size: 2048 }
}

fn sample_index_config() -> IndexConfig {
    IndexConfig { memory_class: MemoryClass::Mb256, checkpoint_frequency: 1000, sparse: false }
}

#[test]
fn formats_a_real_file_and_loads_back() {
    let _ = env_logger::try_init();

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.as_file_mut().write_all(&vec![0u8; 131_072 * 4096]).unwrap();

    let mut layer = FileLayer::open(tmp.path()).unwrap();
    format(&sample_config(), sample_index_config(), &mut layer).unwrap();

    let geometry = load_geometry(&mut layer).unwrap();
    let super_block = load_super_block(&mut layer, geometry.data_partition.starting_offset).unwrap();
    assert_eq!(super_block.component.state, VdoState::New);
}

#[test]
fn reconfigure_round_trips_on_a_real_file() {
    let _ = env_logger::try_init();

    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.as_file_mut().write_all(&vec![0u8; 131_072 * 4096]).unwrap();

    let mut layer = FileLayer::open(tmp.path()).unwrap();
    format(&sample_config(), sample_index_config(), &mut layer).unwrap();

    set_read_only(&mut layer).unwrap();
    force_rebuild(&mut layer).unwrap();

    let geometry = load_geometry(&mut layer).unwrap();
    let super_block = load_super_block(&mut layer, geometry.data_partition.starting_offset).unwrap();
    assert_eq!(super_block.component.state, VdoState::ForceRebuild);
}

#[test]
fn opening_an_already_open_file_layer_path_rejects_a_missing_path() {
    assert!(FileLayer::open("/nonexistent/path/for/vdo/tests").is_err());
}
