//! The release-version table every codec header is checked against.
//!
//! `spec.md` ties format compatibility to a fixed table of `(major, minor)`
//! pairs rather than a single constant, so that a future minor revision can
//! add fields without breaking `load_*` on older volumes. This crate only
//! ever *writes* the current release, but it must still *read* every entry
//! in the table (a volume formatted by an older minor revision of this same
//! major version must still load).

/// The current on-disk release version, written into every new geometry and
/// super block.
pub const CURRENT_RELEASE_VERSION: u32 = 1;

/// `(major, minor)` pairs this crate can load. Decoding fails with
/// `UnsupportedVersion` for any major not in this table, or any minor
/// greater than the newest minor known for that major (see
/// `is_supported_version`).
const SUPPORTED_VERSIONS: &[(u32, u32)] = &[(5, 0)];

/// The header `id` identifying the `VolumeGeometry` record.
pub const GEOMETRY_COMPONENT_ID: u32 = 5;
/// The header `id` identifying the `SuperBlock` record.
pub const SUPER_BLOCK_COMPONENT_ID: u32 = 6;
/// The header `id` identifying the encoded `VDOComponent` sub-record.
pub const VDO_COMPONENT_ID: u32 = 7;
/// The header `id` identifying the encoded `RecoveryJournalState` sub-record.
pub const RECOVERY_JOURNAL_COMPONENT_ID: u32 = 8;
/// The header `id` identifying the encoded `SlabDepotState` sub-record.
pub const SLAB_DEPOT_COMPONENT_ID: u32 = 9;

/// The `(major, minor)` this crate encodes every record with.
pub const CURRENT_MAJOR: u32 = 5;
pub const CURRENT_MINOR: u32 = 0;

/// True if `major` is a known major version and `minor` is no newer than the
/// newest minor this crate knows for that major.
pub fn is_supported_version(major: u32, minor: u32) -> bool {
    SUPPORTED_VERSIONS
        .iter()
        .filter(|&&(known_major, _)| known_major == major)
        .any(|&(_, known_minor)| minor <= known_minor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_current_version() {
        assert!(is_supported_version(CURRENT_MAJOR, CURRENT_MINOR));
    }

    #[test]
    fn rejects_unknown_major() {
        assert!(!is_supported_version(6, 0));
    }

    #[test]
    fn rejects_newer_minor() {
        assert!(!is_supported_version(5, 1));
    }
}
