//! The narrow synchronous block interface the core format engine consumes
//! (`spec.md` §4.1), plus `FileLayer`, a concrete implementation against a
//! real file or block device — the one external collaborator this crate
//! does implement, because a format engine that can only talk to an
//! in-memory stub isn't a usable companion tool.

use std::convert::TryInto;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::ops::{Deref, DerefMut};
use std::os::unix::fs::{FileExt, FileTypeExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::process::Command;

use fs2::FileExt as _;
use nix::ioctl_read;

use crate::config::BLOCK_SIZE;
use crate::error::{Result, VdoError};

/// A zeroed, block-size-aligned buffer of exactly `blocks * BLOCK_SIZE`
/// bytes, owned exclusively by its holder for the duration of one `Layer`
/// call. Alignment is achieved by over-allocating and slicing to the first
/// block-aligned offset; the whole buffer (including the unused prefix) is
/// released when the `IoBuffer` is dropped, satisfying the "guaranteed
/// release on all exit paths" requirement of `spec.md` §5.
pub struct IoBuffer {
    storage: Vec<u8>,
    offset: usize,
    len: usize,
}

impl IoBuffer {
    /// Allocates a zeroed buffer of exactly `blocks` blocks, or
    /// `VdoError::OutOfMemory` if the requested size overflows `usize` or
    /// the allocator cannot satisfy it (`spec.md` §4.1: `allocate_io_buffer`
    /// "fails with OUT_OF_MEMORY").
    pub fn try_new(blocks: usize, tag: &'static str) -> Result<Self> {
        let len = blocks
            .checked_mul(BLOCK_SIZE as usize)
            .ok_or(VdoError::OutOfMemory { bytes: usize::MAX, tag })?;
        let total = len.checked_add(BLOCK_SIZE as usize).ok_or(VdoError::OutOfMemory { bytes: usize::MAX, tag })?;

        let mut storage = Vec::new();
        storage.try_reserve_exact(total).map_err(|_| VdoError::OutOfMemory { bytes: total, tag })?;
        storage.resize(total, 0u8);

        let offset = storage.as_ptr().align_offset(BLOCK_SIZE as usize);
        Ok(Self { storage, offset, len })
    }
}

impl Deref for IoBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.len]
    }
}

impl DerefMut for IoBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.offset..self.offset + self.len]
    }
}

/// The block interface `format_driver`, `geometry`, `super_block`,
/// `journal_init` and `slab_summary_init` are all written against. Every
/// method is synchronous and blocking; there is no suspension point in this
/// crate (`spec.md` §5).
pub trait Layer {
    /// Total blocks available, stable for the duration of one format.
    fn block_count(&self) -> u64;

    /// Returns a zeroed, aligned buffer of exactly `blocks` blocks.
    fn allocate_io_buffer(&self, blocks: usize, tag: &'static str) -> Result<IoBuffer>;

    /// Reads `buf.len() / BLOCK_SIZE` blocks starting at `pbn` into `buf`.
    /// `pbn` and the read extent must be in-bounds; callers check that
    /// before calling.
    fn read(&mut self, pbn: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `buf.len() / BLOCK_SIZE` blocks starting at `pbn`. Durable on
    /// return, or returns `VdoError::Io`.
    fn write(&mut self, pbn: u64, buf: &[u8]) -> Result<()>;
}

/// A `Layer` backed by a regular file or a real block device.
pub struct FileLayer {
    file: File,
    block_count: u64,
}

impl FileLayer {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().canonicalize()?;
        if Self::is_mounted(&path)? {
            return Err(std::io::Error::new(ErrorKind::AlreadyInUse, "device is already mounted").into());
        }

        let file = OpenOptions::new().read(true).write(true).create(false).open(&path)?;
        // Advisory only, released when `file` is dropped; does not stop other
        // processes from opening the same path.
        fs2::FileExt::try_lock_exclusive(&file)?;

        let byte_len = Self::byte_len(&file)?;
        let block_count = byte_len / u64::from(BLOCK_SIZE);
        Ok(Self { file, block_count })
    }

    fn is_mounted(path: &Path) -> Result<bool> {
        let path_str = path.to_str().ok_or_else(|| {
            std::io::Error::new(ErrorKind::InvalidInput, "device path is not valid UTF-8")
        })?;
        let output = Command::new("mount").output()?.stdout;
        let output = String::from_utf8_lossy(&output);
        Ok(output.lines().any(|line| line.starts_with(path_str)))
    }

    fn byte_len(file: &File) -> Result<u64> {
        let metadata = file.metadata()?;
        let file_type = metadata.file_type();
        if file_type.is_file() {
            Ok(metadata.len())
        } else if file_type.is_block_device() {
            Self::block_device_byte_len(file)
        } else {
            Err(std::io::Error::new(ErrorKind::InvalidInput, "expected a regular file or a block device").into())
        }
    }

    // Declared in linux/fs.h. Returns the device size in bytes.
    #[cfg(target_os = "linux")]
    ioctl_read!(blkgetsize64, 0x12, 114, u64);

    #[cfg(target_os = "linux")]
    fn block_device_byte_len(file: &File) -> Result<u64> {
        let mut size: u64 = 0;
        // SAFETY: `size` is a valid u64 and `file` is a block device, checked by the caller.
        unsafe {
            Self::blkgetsize64(file.as_raw_fd(), &mut size).map_err(|err| {
                std::io::Error::new(ErrorKind::Other, format!("BLKGETSIZE64 failed: {err}"))
            })?;
        }
        Ok(size)
    }

    #[cfg(not(target_os = "linux"))]
    fn block_device_byte_len(_file: &File) -> Result<u64> {
        Err(std::io::Error::new(ErrorKind::Unsupported, "block devices are only supported on Linux").into())
    }

    fn bounds_check(&self, pbn: u64, buf_len: usize) -> Result<u64> {
        let blocks: u64 = (buf_len / BLOCK_SIZE as usize)
            .try_into()
            .map_err(|_| std::io::Error::new(ErrorKind::InvalidInput, "buffer too large"))?;
        let end = pbn.checked_add(blocks).ok_or_else(|| {
            std::io::Error::new(ErrorKind::InvalidInput, "pbn + block count overflows")
        })?;
        if buf_len % BLOCK_SIZE as usize != 0 {
            return Err(std::io::Error::new(ErrorKind::InvalidInput, "buffer is not a whole number of blocks").into());
        }
        if end > self.block_count {
            return Err(VdoError::OutOfRange { what: "pbn range", value: end, min: 0, max: self.block_count });
        }
        Ok(pbn * u64::from(BLOCK_SIZE))
    }
}

impl Layer for FileLayer {
    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn allocate_io_buffer(&self, blocks: usize, tag: &'static str) -> Result<IoBuffer> {
        IoBuffer::try_new(blocks, tag)
    }

    fn read(&mut self, pbn: u64, buf: &mut [u8]) -> Result<()> {
        let byte_offset = self.bounds_check(pbn, buf.len())?;
        self.file.read_exact_at(buf, byte_offset)?;
        Ok(())
    }

    fn write(&mut self, pbn: u64, buf: &[u8]) -> Result<()> {
        let byte_offset = self.bounds_check(pbn, buf.len())?;
        self.file.write_all_at(buf, byte_offset)?;
        self.file.sync_data()?;
        Ok(())
    }
}

/// An in-memory `Layer`, used by this crate's own tests and available to
/// downstream callers that want to dry-run a format without touching disk.
pub struct MemoryLayer {
    data: Vec<u8>,
    block_count: u64,
}

impl MemoryLayer {
    pub fn new(block_count: u64) -> Self {
        Self { data: vec![0u8; block_count as usize * BLOCK_SIZE as usize], block_count }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Flips a single bit, for corruption tests.
    pub fn flip_bit(&mut self, byte_offset: usize, bit: u8) {
        self.data[byte_offset] ^= 1 << bit;
    }
}

impl Layer for MemoryLayer {
    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn allocate_io_buffer(&self, blocks: usize, tag: &'static str) -> Result<IoBuffer> {
        IoBuffer::try_new(blocks, tag)
    }

    fn read(&mut self, pbn: u64, buf: &mut [u8]) -> Result<()> {
        let start = pbn as usize * BLOCK_SIZE as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(VdoError::OutOfRange { what: "pbn range", value: (end / BLOCK_SIZE as usize) as u64, min: 0, max: self.block_count });
        }
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write(&mut self, pbn: u64, buf: &[u8]) -> Result<()> {
        let start = pbn as usize * BLOCK_SIZE as usize;
        let end = start + buf.len();
        if end > self.data.len() {
            return Err(VdoError::OutOfRange { what: "pbn range", value: (end / BLOCK_SIZE as usize) as u64, min: 0, max: self.block_count });
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(())
    }
}
