//! File-backed counters buffers shared across processes.
//!
//! The registry core is agnostic to where its two buffers live; this
//! module provides the memory-mapped arrangement that makes cross-process
//! observation work. A [`MappedCountersFile`] holds a single file mapped
//! read-write, laid out as the metadata region followed by the values
//! region, with no header or framing - the file content is exactly the
//! raw record layout documented in [`layout`](crate::layout), so the
//! record capacity is recoverable from the file length alone.
//!
//! The writing process creates the file and constructs a
//! [`CountersManager`](crate::registry::CountersManager) over the mapped
//! buffers; monitoring processes open the same path and construct
//! [`CountersReader`](crate::registry::CountersReader)s. All the
//! ordering guarantees of the in-process case carry over: CPU cache
//! coherence does not distinguish two threads from two processes mapping
//! the same physical pages.
//!
//! # Feature Flag
//!
//! This module requires the `mmap` feature:
//!
//! ```toml
//! [dependencies]
//! registro = { version = "0.2", features = ["mmap"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use registro::mapped::MappedCountersFile;
//! use registro::registry::{CountersManager, CountersReader};
//!
//! // Producer process:
//! let file = MappedCountersFile::create("/dev/shm/my-app.counters", 1024)?;
//! let mut manager = CountersManager::new(file.metadata_buffer(), file.values_buffer());
//! let id = manager.allocate("messages received")?;
//!
//! // Monitoring process:
//! let file = MappedCountersFile::open("/dev/shm/my-app.counters")?;
//! let reader = CountersReader::new(file.metadata_buffer(), file.values_buffer());
//! ```

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;
use thiserror::Error;

use crate::buffer::AtomicBuffer;
use crate::layout::{COUNTER_LENGTH, METADATA_LENGTH};

/// Bytes of file per counter record: one metadata record plus one value
/// record.
pub const BYTES_PER_RECORD: usize = METADATA_LENGTH + COUNTER_LENGTH;

/// Error type for mapped counters files.
#[derive(Debug, Error)]
pub enum MappedFileError {
    /// The file could not be created, sized, or mapped.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The file length is not a whole number of counter records, so it
    /// cannot hold this layout.
    #[error("file length {length} is not a whole number of counter records")]
    Geometry {
        /// The actual file length.
        length: u64,
    },
}

/// A counters file mapped into this process.
///
/// Owns the mapping; the [`AtomicBuffer`] views it hands out borrow from
/// it, so the mapping stays alive as long as any registry built over it.
pub struct MappedCountersFile {
    mmap: MmapMut,
    capacity: usize,
}

impl MappedCountersFile {
    /// The file length needed to hold `capacity` counter records.
    pub const fn file_length(capacity: usize) -> usize {
        capacity * BYTES_PER_RECORD
    }

    /// Creates (or truncates) a counters file sized for `capacity`
    /// records, zero-filled, and maps it read-write.
    pub fn create<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, MappedFileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(Self::file_length(capacity) as u64)?;

        // Safety: the file is held open by the mapping; concurrent access
        // goes through AtomicBuffer's ordered accessors.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self { mmap, capacity })
    }

    /// Opens an existing counters file, deriving the record capacity from
    /// its length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MappedFileError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let length = file.metadata()?.len();

        if length % BYTES_PER_RECORD as u64 != 0 {
            return Err(MappedFileError::Geometry { length });
        }

        // Safety: as in `create`.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            mmap,
            capacity: (length / BYTES_PER_RECORD as u64) as usize,
        })
    }

    /// The number of counter records the file holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The metadata region: the first `capacity * METADATA_LENGTH` bytes.
    pub fn metadata_buffer(&self) -> AtomicBuffer<'_> {
        // Safety: mappings are page-aligned (so 8-byte aligned), the
        // region is in bounds, and it lives as long as the borrow of
        // self. Mutation through the shared mapping is the whole point;
        // all access goes through AtomicBuffer's contract.
        unsafe {
            AtomicBuffer::wrap_raw(
                self.mmap.as_ptr() as *mut u8,
                self.capacity * METADATA_LENGTH,
            )
        }
    }

    /// The values region: the remainder of the file after the metadata
    /// region.
    pub fn values_buffer(&self) -> AtomicBuffer<'_> {
        let offset = self.capacity * METADATA_LENGTH;
        // Safety: as in `metadata_buffer`; METADATA_LENGTH is a multiple
        // of 8 so the values region stays aligned.
        unsafe {
            AtomicBuffer::wrap_raw(
                self.mmap.as_ptr().add(offset) as *mut u8,
                self.capacity * COUNTER_LENGTH,
            )
        }
    }

    /// Flushes the mapping to the backing file.
    ///
    /// Not needed for cross-process visibility (the page cache is
    /// shared); only for durability of the file content itself.
    pub fn flush(&self) -> Result<(), MappedFileError> {
        self.mmap.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for MappedCountersFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedCountersFile")
            .field("capacity", &self.capacity)
            .field("length", &self.mmap.len())
            .finish()
    }
}
