//! User-space companion to a Linux kernel deduplicating block device.
//!
//! Formats a backing block device with the on-disk metadata layout the
//! kernel module expects (`format_driver::format`) and adjusts that
//! metadata out-of-band afterwards (`reconfigure::force_rebuild`,
//! `reconfigure::set_read_only`). Everything else — the CLI, argument and
//! size-unit parsing, the in-kernel runtime, the dedup-index internals —
//! is an external collaborator this crate does not implement.

use std::mem::size_of;

use static_assertions::const_assert;

pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod forest_sizing;
pub mod format_driver;
pub mod geometry;
pub mod journal_init;
pub mod layer;
pub mod layout;
pub mod partition_io;
pub mod reconfigure;
pub mod slab_config;
pub mod slab_summary_init;
pub mod super_block;
pub mod version;

const_assert!(size_of::<usize>() >= size_of::<u32>());
