use thiserror::Error;

/// The error taxonomy this crate reports. Every fallible operation in
/// `vdo_format` returns one of these, never a bare `String`, so a caller can
/// match on *why* without parsing a message.
#[derive(Error, Debug)]
pub enum VdoError {
    #[error("{what} out of range: {value} not in [{min}, {max}]")]
    OutOfRange { what: &'static str, value: u64, min: u64, max: u64 },

    #[error("out of memory allocating {bytes} bytes for {tag}")]
    OutOfMemory { bytes: usize, tag: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: &'static [u8], found: Vec<u8> },

    #[error("unsupported version {major}.{minor} (component id {id})")]
    UnsupportedVersion { id: u32, major: u32, minor: u32 },

    #[error("checksum mismatch: expected {expected:#x}, computed {computed:#x}")]
    BadChecksum { expected: u32, computed: u32 },

    #[error("incorrect component: expected id {expected}, found id {found}")]
    IncorrectComponent { expected: u32, found: u32 },

    #[error("bad length: header declares size {declared}, buffer has {actual}")]
    BadLength { declared: u32, actual: usize },

    #[error("force-rebuild requires a read-only volume, but it is in state {state:?}")]
    NotReadOnly { state: crate::super_block::VdoState },

    #[error("corrupt geometry: {0}")]
    Corrupt(&'static str),
}

pub type Result<T> = std::result::Result<T, VdoError>;
