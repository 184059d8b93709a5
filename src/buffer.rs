//! Byte-addressable buffer with ordered atomic access.
//!
//! The registry never owns the memory it operates on: the metadata and
//! values regions are supplied by the caller and may be ordinary process
//! memory or a file mapped into several processes at once. [`AtomicBuffer`]
//! is the accessor abstraction over such a region. It is a plain
//! pointer-and-length handle (cheap to copy, `Send + Sync`) whose word
//! accessors go through [`AtomicI32`]/[`AtomicI64`] references, so
//! concurrent use from multiple threads is never a data race in the
//! language sense.
//!
//! All offsets are bounds-checked and panic when out of range, the same
//! way slice indexing does. Word accessors additionally require their
//! natural alignment, which holds for every offset the registry layout
//! produces as long as the region itself is 8-byte aligned - a property
//! checked at construction.
//!
//! [`AlignedBuffer`] provides owned, zeroed, suitably aligned backing
//! storage for in-process use and tests:
//!
//! ```rust
//! use registro::buffer::AlignedBuffer;
//!
//! let backing = AlignedBuffer::new(1024);
//! let buffer = backing.as_buffer();
//!
//! buffer.put_i64(0, 42);
//! assert_eq!(buffer.get_i64(0), 42);
//! ```

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

/// A byte-addressable view over externally owned memory with ordered
/// 32-bit and 64-bit accessors and bulk byte copies.
///
/// The handle is `Copy`: any number of views over the same region may
/// coexist, across threads and across processes. Which of them is allowed
/// to write is a caller contract (the registry has a single-writer
/// discipline), not something the buffer enforces.
///
/// # Memory ordering
///
/// * `*_volatile` loads use [`Ordering::Acquire`].
/// * `*_ordered` stores use [`Ordering::Release`].
/// * The plain `get_*`/`put_*` variants use [`Ordering::Relaxed`]; they
///   exist for fields that are only read after an Acquire load of a
///   publication flag has established visibility.
///
/// # Bulk copies
///
/// `get_bytes`/`put_bytes` are ordinary memcpys with no atomicity. The
/// registry only uses them on regions that are immutable once published,
/// so a reader that respected the publication protocol never races them.
#[derive(Clone, Copy)]
pub struct AtomicBuffer<'a> {
    ptr: *mut u8,
    capacity: usize,
    _memory: PhantomData<&'a UnsafeCell<[u8]>>,
}

// The pointer is only dereferenced through atomics or on regions governed
// by the publication protocol documented above.
unsafe impl Send for AtomicBuffer<'_> {}
unsafe impl Sync for AtomicBuffer<'_> {}

impl<'a> AtomicBuffer<'a> {
    /// Wraps a mutable byte slice.
    ///
    /// # Panics
    ///
    /// Panics if the slice is not 8-byte aligned; word accessors would
    /// otherwise fault or tear on some targets.
    pub fn wrap(slice: &'a mut [u8]) -> Self {
        let ptr = slice.as_mut_ptr();
        assert!(
            ptr as usize % 8 == 0,
            "buffer must be 8-byte aligned, got {:p}",
            ptr
        );
        Self {
            ptr,
            capacity: slice.len(),
            _memory: PhantomData,
        }
    }

    /// Wraps a raw memory region, typically one obtained from a memory
    /// mapping shared with other processes.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `capacity` bytes for
    /// the lifetime `'a`, and must be 8-byte aligned. The region must not
    /// be accessed through non-atomic mutable references while any copy of
    /// this view is live.
    pub unsafe fn wrap_raw(ptr: *mut u8, capacity: usize) -> Self {
        assert!(
            ptr as usize % 8 == 0,
            "buffer must be 8-byte aligned, got {:p}",
            ptr
        );
        Self {
            ptr,
            capacity,
            _memory: PhantomData,
        }
    }

    /// The capacity of the underlying region in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A sub-view of `len` bytes starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn view(&self, offset: usize, len: usize) -> AtomicBuffer<'a> {
        self.bounds_check(offset, len);
        AtomicBuffer {
            // Safety: bounds checked above, alignment of sub-views is the
            // caller's concern for word accessors (checked per access).
            ptr: unsafe { self.ptr.add(offset) },
            capacity: len,
            _memory: PhantomData,
        }
    }

    #[inline]
    fn bounds_check(&self, offset: usize, len: usize) {
        assert!(
            offset.checked_add(len).is_some_and(|end| end <= self.capacity),
            "access of {} bytes at offset {} out of bounds (capacity {})",
            len,
            offset,
            self.capacity
        );
    }

    #[inline]
    fn atomic_i32(&self, offset: usize) -> &AtomicI32 {
        self.bounds_check(offset, 4);
        debug_assert!((self.ptr as usize + offset) % 4 == 0);
        // Safety: in bounds, aligned, and the region outlives 'a.
        unsafe { &*(self.ptr.add(offset) as *const AtomicI32) }
    }

    #[inline]
    fn atomic_i64(&self, offset: usize) -> &AtomicI64 {
        self.bounds_check(offset, 8);
        debug_assert!((self.ptr as usize + offset) % 8 == 0);
        // Safety: in bounds, aligned, and the region outlives 'a.
        unsafe { &*(self.ptr.add(offset) as *const AtomicI64) }
    }

    /// Relaxed 32-bit load.
    #[inline]
    pub fn get_i32(&self, offset: usize) -> i32 {
        self.atomic_i32(offset).load(Ordering::Relaxed)
    }

    /// Acquire 32-bit load.
    #[inline]
    pub fn get_i32_volatile(&self, offset: usize) -> i32 {
        self.atomic_i32(offset).load(Ordering::Acquire)
    }

    /// Relaxed 32-bit store.
    #[inline]
    pub fn put_i32(&self, offset: usize, value: i32) {
        self.atomic_i32(offset).store(value, Ordering::Relaxed);
    }

    /// Release 32-bit store.
    #[inline]
    pub fn put_i32_ordered(&self, offset: usize, value: i32) {
        self.atomic_i32(offset).store(value, Ordering::Release);
    }

    /// Relaxed 64-bit load.
    #[inline]
    pub fn get_i64(&self, offset: usize) -> i64 {
        self.atomic_i64(offset).load(Ordering::Relaxed)
    }

    /// Acquire 64-bit load.
    #[inline]
    pub fn get_i64_volatile(&self, offset: usize) -> i64 {
        self.atomic_i64(offset).load(Ordering::Acquire)
    }

    /// Relaxed 64-bit store.
    #[inline]
    pub fn put_i64(&self, offset: usize, value: i64) {
        self.atomic_i64(offset).store(value, Ordering::Relaxed);
    }

    /// Release 64-bit store.
    #[inline]
    pub fn put_i64_ordered(&self, offset: usize, value: i64) {
        self.atomic_i64(offset).store(value, Ordering::Release);
    }

    /// Atomically adds `delta` to the 64-bit word at `offset`, returning
    /// the previous value.
    #[inline]
    pub fn get_and_add_i64(&self, offset: usize, delta: i64) -> i64 {
        self.atomic_i64(offset).fetch_add(delta, Ordering::AcqRel)
    }

    /// Atomically replaces the 64-bit word at `offset` with `update` if it
    /// currently equals `expected`. Returns `true` on success.
    #[inline]
    pub fn compare_and_set_i64(&self, offset: usize, expected: i64, update: i64) -> bool {
        self.atomic_i64(offset)
            .compare_exchange(expected, update, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the source range is out of bounds.
    pub fn get_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.bounds_check(offset, dst.len());
        // Safety: bounds checked; dst is a freshly borrowed local slice so
        // the ranges cannot overlap.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.add(offset), dst.as_mut_ptr(), dst.len());
        }
    }

    /// Copies `src` into the region starting at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the destination range is out of bounds.
    pub fn put_bytes(&self, offset: usize, src: &[u8]) {
        self.bounds_check(offset, src.len());
        // Safety: bounds checked; src is a borrowed slice outside the
        // region or the caller's own scratch memory.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.add(offset), src.len());
        }
    }

    /// Fills `len` bytes starting at `offset` with `value`.
    pub fn set_memory(&self, offset: usize, len: usize, value: u8) {
        self.bounds_check(offset, len);
        // Safety: bounds checked.
        unsafe {
            std::ptr::write_bytes(self.ptr.add(offset), value, len);
        }
    }
}

impl std::fmt::Debug for AtomicBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicBuffer")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Owned, zero-filled, 8-byte aligned backing storage.
///
/// The registry operates on externally owned memory; this is the simplest
/// way to own such memory inside a single process. The storage is a boxed
/// slice of `u64` words, which guarantees the alignment that
/// [`AtomicBuffer::wrap`] requires.
///
/// # Examples
///
/// ```rust
/// use registro::buffer::AlignedBuffer;
/// use registro::layout::{COUNTER_LENGTH, METADATA_LENGTH};
///
/// let metadata = AlignedBuffer::new(8 * METADATA_LENGTH);
/// let values = AlignedBuffer::new(8 * COUNTER_LENGTH);
///
/// assert_eq!(metadata.capacity(), 8 * METADATA_LENGTH);
/// ```
pub struct AlignedBuffer {
    words: Box<[UnsafeCell<u64>]>,
}

// All access to the words goes through AtomicBuffer, which upholds the
// concurrency contract documented there.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocates `capacity` bytes of zeroed storage, rounded up to the
    /// next multiple of 8.
    pub fn new(capacity: usize) -> Self {
        let words = capacity.div_ceil(8);
        Self {
            words: (0..words).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    /// The capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.words.len() * 8
    }

    /// An [`AtomicBuffer`] view over the whole storage.
    pub fn as_buffer(&self) -> AtomicBuffer<'_> {
        // Safety: the storage is 8-byte aligned by construction, lives as
        // long as the returned view, and is only reachable through
        // UnsafeCell so shared mutation is permitted.
        unsafe { AtomicBuffer::wrap_raw(self.words.as_ptr() as *mut u8, self.capacity()) }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("capacity", &self.capacity())
            .finish()
    }
}
