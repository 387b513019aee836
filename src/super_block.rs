//! The super block: one block at the data-region origin encoding the VDO
//! component, recovery-journal state, and slab-depot state (`spec.md` §3,
//! §4.9).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum::crc32c;
use crate::codec::Header;
use crate::config::BLOCK_SIZE;
use crate::error::{Result, VdoError};
use crate::layer::Layer;
use crate::slab_config::SlabConfig;
use crate::version;

/// The persisted volume-state tag (`spec.md` §3). Every variant round-trips
/// through `encode`/`decode` even though this crate only ever writes `New`,
/// `ForceRebuild`, and `ReadOnlyMode` — a volume loaded after having run
/// under the kernel module may be in any of the others, and `load_super_block`
/// must not reject a volume just because its state is one this crate never
/// produces itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VdoState {
    New = 0,
    Clean = 1,
    Dirty = 2,
    ReadOnlyMode = 3,
    ForceRebuild = 4,
    Recovering = 5,
    RebuildForUpgrade = 6,
    Replaying = 7,
}

impl VdoState {
    fn encode(self) -> u8 {
        self as u8
    }

    fn decode(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(VdoState::New),
            1 => Ok(VdoState::Clean),
            2 => Ok(VdoState::Dirty),
            3 => Ok(VdoState::ReadOnlyMode),
            4 => Ok(VdoState::ForceRebuild),
            5 => Ok(VdoState::Recovering),
            6 => Ok(VdoState::RebuildForUpgrade),
            7 => Ok(VdoState::Replaying),
            other => Err(VdoError::Corrupt(corrupt_state_message(other))),
        }
    }
}

fn corrupt_state_message(_byte: u8) -> &'static str {
    "unknown VDO state tag"
}

/// The configuration snapshot baked into the VDO component at format time:
/// the values `format_driver` resolved from `FormatConfig`, not the raw
/// config (e.g. `logical_blocks` here is never 0 — it's already been
/// derived by `forest_sizing::compute_logical_blocks` if the caller asked
/// for "fill the device").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdoConfigSnapshot {
    pub logical_blocks: u64,
    pub physical_blocks: u64,
    pub slab_size: u32,
    pub slab_journal_blocks: u32,
    pub recovery_journal_size: u32,
}

impl VdoConfigSnapshot {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(self.logical_blocks);
        buf.put_u64_le(self.physical_blocks);
        buf.put_u32_le(self.slab_size);
        buf.put_u32_le(self.slab_journal_blocks);
        buf.put_u32_le(self.recovery_journal_size);
    }

    fn decode(buf: &mut Bytes) -> Self {
        Self {
            logical_blocks: buf.get_u64_le(),
            physical_blocks: buf.get_u64_le(),
            slab_size: buf.get_u32_le(),
            slab_journal_blocks: buf.get_u32_le(),
            recovery_journal_size: buf.get_u32_le(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdoComponent {
    pub state: VdoState,
    pub nonce: u64,
    pub config: VdoConfigSnapshot,
    pub complete_recoveries: u32,
    pub read_only_recoveries: u32,
}

impl VdoComponent {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.state.encode());
        buf.put_u64_le(self.nonce);
        self.config.encode(buf);
        buf.put_u32_le(self.complete_recoveries);
        buf.put_u32_le(self.read_only_recoveries);
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        let state = VdoState::decode(buf.get_u8())?;
        let nonce = buf.get_u64_le();
        let config = VdoConfigSnapshot::decode(buf);
        let complete_recoveries = buf.get_u32_le();
        let read_only_recoveries = buf.get_u32_le();
        Ok(Self { state, nonce, config, complete_recoveries, read_only_recoveries })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryJournalState {
    pub head_sequence_number: u64,
    pub tail_sequence_number: u64,
}

impl RecoveryJournalState {
    /// The state every freshly formatted volume starts with: nothing has
    /// been written yet, so head and tail are both 1 (`spec.md` §4.9 step 3).
    pub fn fresh() -> Self {
        Self { head_sequence_number: 1, tail_sequence_number: 1 }
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(self.head_sequence_number);
        buf.put_u64_le(self.tail_sequence_number);
    }

    fn decode(buf: &mut Bytes) -> Self {
        Self { head_sequence_number: buf.get_u64_le(), tail_sequence_number: buf.get_u64_le() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabDepotState {
    pub first_block: u64,
    pub slab_count: u64,
    pub slab_config: SlabConfig,
    pub zone_count: u32,
}

impl SlabDepotState {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64_le(self.first_block);
        buf.put_u64_le(self.slab_count);
        buf.put_u32_le(self.slab_config.slab_blocks);
        buf.put_u32_le(self.slab_config.journal_blocks);
        buf.put_u32_le(self.slab_config.reference_count_blocks);
        buf.put_u32_le(self.slab_config.data_blocks);
        buf.put_u32_le(self.zone_count);
    }

    fn decode(buf: &mut Bytes) -> Self {
        let first_block = buf.get_u64_le();
        let slab_count = buf.get_u64_le();
        let slab_blocks = buf.get_u32_le();
        let journal_blocks = buf.get_u32_le();
        let reference_count_blocks = buf.get_u32_le();
        let data_blocks = buf.get_u32_le();
        let zone_count = buf.get_u32_le();
        Self {
            first_block,
            slab_count,
            slab_config: SlabConfig { slab_blocks, journal_blocks, reference_count_blocks, data_blocks },
            zone_count,
        }
    }
}

/// The decoded super block: everything a reader needs to know about an
/// already-formatted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub release_version: u32,
    pub recovery_journal: RecoveryJournalState,
    pub slab_depot: SlabDepotState,
    pub component: VdoComponent,
}

impl SuperBlock {
    pub fn new(recovery_journal: RecoveryJournalState, slab_depot: SlabDepotState, component: VdoComponent) -> Self {
        Self { release_version: version::CURRENT_RELEASE_VERSION, recovery_journal, slab_depot, component }
    }

    /// Encodes the full block: header, checksum placeholder, release
    /// version, recovery-journal state, slab-depot state, VDO component,
    /// zero padding, then the CRC-32C over everything after the checksum
    /// field (the same convention `geometry` uses).
    pub fn encode(&self) -> BytesMut {
        let header = Header::new(version::SUPER_BLOCK_COMPONENT_ID, BLOCK_SIZE);

        let mut buf = BytesMut::with_capacity(BLOCK_SIZE as usize);
        header.encode(&mut buf);
        buf.put_u32_le(0); // checksum placeholder
        buf.put_u32_le(self.release_version);
        self.recovery_journal.encode(&mut buf);
        self.slab_depot.encode(&mut buf);
        self.component.encode(&mut buf);

        buf.resize(BLOCK_SIZE as usize, 0);

        let checksum = crc32c(&buf[20..]);
        buf[16..20].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    pub fn decode(block: &[u8]) -> Result<Self> {
        if block.len() < BLOCK_SIZE as usize {
            return Err(VdoError::BadLength { declared: BLOCK_SIZE, actual: block.len() });
        }

        let mut header_cursor = Bytes::copy_from_slice(&block[0..16]);
        let header = Header::decode(&mut header_cursor);
        header.validate(version::SUPER_BLOCK_COMPONENT_ID, BLOCK_SIZE as usize)?;

        let expected_checksum = u32::from_le_bytes(block[16..20].try_into().unwrap());
        let computed_checksum = crc32c(&block[20..BLOCK_SIZE as usize]);
        if expected_checksum != computed_checksum {
            return Err(VdoError::BadChecksum { expected: expected_checksum, computed: computed_checksum });
        }

        let mut cursor = Bytes::copy_from_slice(&block[20..BLOCK_SIZE as usize]);
        let release_version = cursor.get_u32_le();
        let recovery_journal = RecoveryJournalState::decode(&mut cursor);
        let slab_depot = SlabDepotState::decode(&mut cursor);
        let component = VdoComponent::decode(&mut cursor)?;

        Ok(Self { release_version, recovery_journal, slab_depot, component })
    }
}

/// Writes `super_block` at `pbn` (the data-region origin).
pub fn write_super_block(layer: &mut dyn Layer, pbn: u64, super_block: &SuperBlock) -> Result<()> {
    let encoded = super_block.encode();
    layer.write(pbn, &encoded)
}

/// Reads and validates the super block at `pbn`.
pub fn load_super_block(layer: &mut dyn Layer, pbn: u64) -> Result<SuperBlock> {
    let mut block = vec![0u8; BLOCK_SIZE as usize];
    layer.read(pbn, &mut block)?;
    SuperBlock::decode(&block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MemoryLayer;

    fn sample_super_block() -> SuperBlock {
        let slab_config = SlabConfig { slab_blocks: 8192, journal_blocks: 224, reference_count_blocks: 2, data_blocks: 7966 };
        SuperBlock::new(
            RecoveryJournalState::fresh(),
            SlabDepotState { first_block: 1, slab_count: 16, slab_config, zone_count: 1 },
            VdoComponent {
                state: VdoState::New,
                nonce: 0xCAFE_BABE,
                config: VdoConfigSnapshot {
                    logical_blocks: 123_456,
                    physical_blocks: 131_072,
                    slab_size: 8192,
                    slab_journal_blocks: 224,
                    recovery_journal_size: 2048,
                },
                complete_recoveries: 0,
                read_only_recoveries: 0,
            },
        )
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let sb = sample_super_block();
        let decoded = SuperBlock::decode(&sb.encode()).unwrap();
        assert_eq!(decoded, sb);
    }

    #[test]
    fn write_then_load_round_trips() {
        let mut layer = MemoryLayer::new(256);
        let sb = sample_super_block();
        write_super_block(&mut layer, 5, &sb).unwrap();
        let loaded = load_super_block(&mut layer, 5).unwrap();
        assert_eq!(loaded, sb);
    }

    #[test]
    fn byte_flip_in_version_field_is_unsupported_version_not_bad_checksum() {
        let mut layer = MemoryLayer::new(256);
        let sb = sample_super_block();
        write_super_block(&mut layer, 5, &sb).unwrap();
        // The minor-version byte lives inside the header, at byte offset 8..12.
        layer.flip_bit(5 * BLOCK_SIZE as usize + 8, 0);
        assert!(matches!(load_super_block(&mut layer, 5), Err(VdoError::UnsupportedVersion { .. })));
    }

    #[test]
    fn byte_flip_elsewhere_is_bad_checksum() {
        let mut layer = MemoryLayer::new(256);
        let sb = sample_super_block();
        write_super_block(&mut layer, 5, &sb).unwrap();
        layer.flip_bit(5 * BLOCK_SIZE as usize + 40, 0);
        assert!(matches!(load_super_block(&mut layer, 5), Err(VdoError::BadChecksum { .. })));
    }

    #[test]
    fn fresh_recovery_journal_starts_at_one_one() {
        let journal = RecoveryJournalState::fresh();
        assert_eq!(journal.head_sequence_number, 1);
        assert_eq!(journal.tail_sequence_number, 1);
    }
}
