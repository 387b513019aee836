//! The volume-geometry block: the single block at PBN 0 that identifies a
//! device as belonging to this format and pins the data-region offset,
//! nonce, and UUID (`spec.md` §3–§4.4, §6).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum::crc32c;
use crate::codec::Header;
use crate::config::{IndexConfig, MemoryClass, BLOCK_SIZE};
use crate::error::{Result, VdoError};
use crate::layer::Layer;
use crate::version;

pub const GEOMETRY_MAGIC: &[u8; 8] = b"dmvdo001";
pub const GEOMETRY_PBN: u64 = 0;

const INDEX_PARTITION_ID: u32 = 0;
const DATA_PARTITION_ID: u32 = 1;

const MEMORY_CLASS_TAG_MB256: u8 = 0;
const MEMORY_CLASS_TAG_MB512: u8 = 1;
const MEMORY_CLASS_TAG_MB768: u8 = 2;
const MEMORY_CLASS_TAG_GB: u8 = 3;

/// One entry of the two-entry partition table embedded in the geometry
/// block: `{id, starting_offset, length_blocks}`, 20 bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryPartition {
    pub id: u32,
    pub starting_offset: u64,
    pub length_blocks: u64,
}

impl GeometryPartition {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.id);
        buf.put_u64_le(self.starting_offset);
        buf.put_u64_le(self.length_blocks);
    }

    fn decode(buf: &mut Bytes) -> Self {
        let id = buf.get_u32_le();
        let starting_offset = buf.get_u64_le();
        let length_blocks = buf.get_u64_le();
        Self { id, starting_offset, length_blocks }
    }
}

/// The geometry block built in memory by `format_driver` before anything is
/// written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryBlock {
    pub release_version: u32,
    pub nonce: u64,
    pub uuid: [u8; 16],
    pub index_partition: GeometryPartition,
    pub data_partition: GeometryPartition,
    pub index_config: IndexConfig,
}

impl GeometryBlock {
    /// Lays out the dedup-index partition starting at PBN 1 and the data
    /// region immediately after it, running to the end of the device.
    pub fn build(nonce: u64, uuid: [u8; 16], index_config: IndexConfig, physical_blocks: u64) -> Result<Self> {
        let index_length = index_config.memory_class.index_region_blocks(index_config.sparse);
        let data_offset = 1 + index_length;
        if data_offset >= physical_blocks {
            return Err(VdoError::OutOfRange {
                what: "physical_blocks (too small for the requested index memory class)",
                value: physical_blocks,
                min: data_offset + 1,
                max: u64::MAX,
            });
        }

        Ok(Self {
            release_version: version::CURRENT_RELEASE_VERSION,
            nonce,
            uuid,
            index_partition: GeometryPartition { id: INDEX_PARTITION_ID, starting_offset: 1, length_blocks: index_length },
            data_partition: GeometryPartition {
                id: DATA_PARTITION_ID,
                starting_offset: data_offset,
                length_blocks: physical_blocks - data_offset,
            },
            index_config,
        })
    }

    fn encode_memory_class(buf: &mut BytesMut, class: MemoryClass) {
        match class {
            MemoryClass::Mb256 => {
                buf.put_u8(MEMORY_CLASS_TAG_MB256);
                buf.put_u32_le(0);
            }
            MemoryClass::Mb512 => {
                buf.put_u8(MEMORY_CLASS_TAG_MB512);
                buf.put_u32_le(0);
            }
            MemoryClass::Mb768 => {
                buf.put_u8(MEMORY_CLASS_TAG_MB768);
                buf.put_u32_le(0);
            }
            MemoryClass::Gb(n) => {
                buf.put_u8(MEMORY_CLASS_TAG_GB);
                buf.put_u32_le(n);
            }
        }
    }

    fn decode_memory_class(buf: &mut Bytes) -> Result<MemoryClass> {
        let tag = buf.get_u8();
        let value = buf.get_u32_le();
        match tag {
            MEMORY_CLASS_TAG_MB256 => Ok(MemoryClass::Mb256),
            MEMORY_CLASS_TAG_MB512 => Ok(MemoryClass::Mb512),
            MEMORY_CLASS_TAG_MB768 => Ok(MemoryClass::Mb768),
            MEMORY_CLASS_TAG_GB => MemoryClass::gb(value),
            _ => Err(VdoError::Corrupt("unknown memory class tag")),
        }
    }

    /// Encodes the full 4096-byte geometry block, computing the CRC-32C
    /// over everything after the checksum field (`spec.md` §4.3).
    pub fn encode(&self) -> BytesMut {
        let header = Header::new(version::GEOMETRY_COMPONENT_ID, BLOCK_SIZE);

        let mut buf = BytesMut::with_capacity(BLOCK_SIZE as usize);
        buf.put_slice(GEOMETRY_MAGIC);
        header.encode(&mut buf);
        buf.put_u32_le(self.release_version);
        buf.put_u32_le(0); // checksum placeholder, filled in below
        buf.put_u64_le(self.nonce);
        buf.put_slice(&self.uuid);
        self.index_partition.encode(&mut buf);
        self.data_partition.encode(&mut buf);
        Self::encode_memory_class(&mut buf, self.index_config.memory_class);
        buf.put_u32_le(self.index_config.checkpoint_frequency);
        buf.put_u8(self.index_config.sparse as u8);

        buf.resize(BLOCK_SIZE as usize, 0);

        let checksum = crc32c(&buf[32..]);
        buf[28..32].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Decodes and validates a geometry block: magic, header, checksum, and
    /// the `data_region.offset > 0` invariant (`spec.md` §4.4).
    pub fn decode(block: &[u8]) -> Result<Self> {
        if block.len() < BLOCK_SIZE as usize {
            return Err(VdoError::BadLength { declared: BLOCK_SIZE, actual: block.len() });
        }
        if &block[0..8] != GEOMETRY_MAGIC {
            return Err(VdoError::BadMagic { expected: GEOMETRY_MAGIC, found: block[0..8].to_vec() });
        }

        let expected_checksum = u32::from_le_bytes(block[28..32].try_into().unwrap());
        let computed_checksum = crc32c(&block[32..BLOCK_SIZE as usize]);
        if expected_checksum != computed_checksum {
            return Err(VdoError::BadChecksum { expected: expected_checksum, computed: computed_checksum });
        }

        let mut cursor = Bytes::copy_from_slice(&block[8..BLOCK_SIZE as usize]);
        let header = Header::decode(&mut cursor);
        header.validate(version::GEOMETRY_COMPONENT_ID, BLOCK_SIZE as usize)?;

        let release_version = cursor.get_u32_le();
        let _checksum = cursor.get_u32_le();
        let nonce = cursor.get_u64_le();
        let mut uuid = [0u8; 16];
        cursor.copy_to_slice(&mut uuid);
        let index_partition = GeometryPartition::decode(&mut cursor);
        let data_partition = GeometryPartition::decode(&mut cursor);
        let memory_class = Self::decode_memory_class(&mut cursor)?;
        let checkpoint_frequency = cursor.get_u32_le();
        let sparse = cursor.get_u8() != 0;

        if data_partition.starting_offset == 0 {
            return Err(VdoError::Corrupt("data region starts at PBN 0"));
        }
        if data_partition.starting_offset < 1 + index_partition.length_blocks {
            return Err(VdoError::Corrupt("data region overlaps the dedup-index partition"));
        }

        Ok(Self {
            release_version,
            nonce,
            uuid,
            index_partition,
            data_partition,
            index_config: IndexConfig { memory_class, checkpoint_frequency, sparse },
        })
    }
}

/// Writes `geometry` at PBN 0. `format_driver` calls this last, so a torn
/// format leaves PBN 0 either zeroed (from `clear_geometry`) or holding a
/// fully valid geometry — never something half-written.
pub fn write_geometry(layer: &mut dyn Layer, geometry: &GeometryBlock) -> Result<()> {
    let encoded = geometry.encode();
    layer.write(GEOMETRY_PBN, &encoded)
}

/// Zeroes PBN 0. Called before the super block is written, so a crash
/// mid-format leaves a device that fails `load_geometry` with `BadMagic`
/// rather than one that loads with stale metadata.
pub fn clear_geometry(layer: &mut dyn Layer) -> Result<()> {
    let zero = vec![0u8; BLOCK_SIZE as usize];
    layer.write(GEOMETRY_PBN, &zero)
}

/// Reads and validates PBN 0.
pub fn load_geometry(layer: &mut dyn Layer) -> Result<GeometryBlock> {
    let mut block = vec![0u8; BLOCK_SIZE as usize];
    layer.read(GEOMETRY_PBN, &mut block)?;
    GeometryBlock::decode(&block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MemoryLayer;

    fn sample_index_config() -> IndexConfig {
        IndexConfig { memory_class: MemoryClass::Mb256, checkpoint_frequency: 1000, sparse: false }
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let geometry = GeometryBlock::build(0xDEAD_BEEF, [7u8; 16], sample_index_config(), 131_072).unwrap();
        let encoded = geometry.encode();
        let decoded = GeometryBlock::decode(&encoded).unwrap();
        assert_eq!(decoded, geometry);
    }

    #[test]
    fn data_region_starts_past_index_partition() {
        let geometry = GeometryBlock::build(1, [0u8; 16], sample_index_config(), 131_072).unwrap();
        assert!(geometry.data_partition.starting_offset >= 1 + geometry.index_partition.length_blocks);
    }

    #[test]
    fn rejects_device_too_small_for_index() {
        let result = GeometryBlock::build(1, [0u8; 16], sample_index_config(), 1);
        assert!(matches!(result, Err(VdoError::OutOfRange { .. })));
    }

    #[test]
    fn write_then_load_round_trips() {
        let mut layer = MemoryLayer::new(131_072);
        let geometry = GeometryBlock::build(42, [9u8; 16], sample_index_config(), 131_072).unwrap();
        write_geometry(&mut layer, &geometry).unwrap();
        let loaded = load_geometry(&mut layer).unwrap();
        assert_eq!(loaded, geometry);
    }

    #[test]
    fn clear_geometry_makes_load_fail_with_bad_magic() {
        let mut layer = MemoryLayer::new(131_072);
        let geometry = GeometryBlock::build(42, [9u8; 16], sample_index_config(), 131_072).unwrap();
        write_geometry(&mut layer, &geometry).unwrap();
        clear_geometry(&mut layer).unwrap();
        assert!(matches!(load_geometry(&mut layer), Err(VdoError::BadMagic { .. })));
    }

    #[test]
    fn corrupted_checksum_is_detected() {
        let mut layer = MemoryLayer::new(131_072);
        let geometry = GeometryBlock::build(42, [9u8; 16], sample_index_config(), 131_072).unwrap();
        write_geometry(&mut layer, &geometry).unwrap();
        layer.flip_bit(40, 0); // inside the nonce field, covered by the checksum
        assert!(matches!(load_geometry(&mut layer), Err(VdoError::BadChecksum { .. })));
    }
}
