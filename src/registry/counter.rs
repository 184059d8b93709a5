//! Handle over a single counter value slot.

use crate::buffer::AtomicBuffer;
use crate::layout::counter_offset;

/// A handle over one allocated counter's value slot.
///
/// Wraps the values buffer and a counter id obtained from
/// [`CountersManager`](crate::registry::CountersManager), giving the
/// owning writer convenient ordered mutation and observers race-free
/// reads. The handle carries no registry state: dropping it does not
/// free the counter, and any number of read-only holders may exist.
///
/// # Examples
///
/// ```rust
/// use registro::buffer::AlignedBuffer;
/// use registro::layout::{COUNTER_LENGTH, METADATA_LENGTH};
/// use registro::registry::CountersManager;
///
/// let metadata = AlignedBuffer::new(4 * METADATA_LENGTH);
/// let values = AlignedBuffer::new(4 * COUNTER_LENGTH);
/// let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());
///
/// let counter = manager.new_counter("messages relayed")?;
/// counter.increment();
/// counter.add(9);
/// assert_eq!(counter.get(), 10);
/// # Ok::<(), registro::registry::CountersError>(())
/// ```
#[derive(Clone, Copy)]
pub struct AtomicCounter<'a> {
    buffer: AtomicBuffer<'a>,
    counter_id: i32,
    offset: usize,
}

impl<'a> AtomicCounter<'a> {
    /// Wraps the value slot of `counter_id` in `values_buffer`.
    ///
    /// # Panics
    ///
    /// Panics if the id's record does not fit in the buffer.
    pub fn new(values_buffer: AtomicBuffer<'a>, counter_id: i32) -> Self {
        let offset = counter_offset(counter_id);
        assert!(
            offset + 8 <= values_buffer.capacity(),
            "counter id {} out of bounds for values buffer of {} bytes",
            counter_id,
            values_buffer.capacity()
        );
        Self {
            buffer: values_buffer,
            counter_id,
            offset,
        }
    }

    /// The id of the counter this handle wraps.
    #[inline]
    pub fn id(&self) -> i32 {
        self.counter_id
    }

    /// The counter value, read with Acquire ordering.
    #[inline]
    pub fn get(&self) -> i64 {
        self.buffer.get_i64_volatile(self.offset)
    }

    /// The counter value, read with Relaxed ordering.
    ///
    /// For the owning writer thread, which already observes its own
    /// stores.
    #[inline]
    pub fn get_weak(&self) -> i64 {
        self.buffer.get_i64(self.offset)
    }

    /// Stores a value with Release ordering.
    #[inline]
    pub fn set_ordered(&self, value: i64) {
        self.buffer.put_i64_ordered(self.offset, value);
    }

    /// Atomically increments the counter by one, returning the previous
    /// value.
    #[inline]
    pub fn increment(&self) -> i64 {
        self.buffer.get_and_add_i64(self.offset, 1)
    }

    /// Atomically adds `delta` to the counter, returning the previous
    /// value.
    #[inline]
    pub fn add(&self, delta: i64) -> i64 {
        self.buffer.get_and_add_i64(self.offset, delta)
    }

    /// Atomically replaces the value with `update` if it currently equals
    /// `expected`. Returns `true` on success.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, update: i64) -> bool {
        self.buffer.compare_and_set_i64(self.offset, expected, update)
    }
}

impl std::fmt::Debug for AtomicCounter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicCounter")
            .field("counter_id", &self.counter_id)
            .field("value", &self.get())
            .finish()
    }
}
