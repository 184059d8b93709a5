//! Single-writer manager for allocating and reclaiming counter records.

use std::collections::VecDeque;
use std::ops::Deref;

use crate::buffer::AtomicBuffer;
use crate::layout::{
    counter_offset, metadata_offset, KEY_OFFSET, LABEL_OFFSET, MAX_KEY_LENGTH, MAX_LABEL_LENGTH,
    RECORD_ALLOCATED, RECORD_RECLAIMED, TYPE_ID_OFFSET,
};
use crate::registry::{
    AtomicCounter, CountersError, CountersReader, LabelEncoding, DEFAULT_TYPE_ID,
};

/// Error type a key-population callback may return.
pub type KeyWriterError = Box<dyn std::error::Error + Send + Sync>;

/// The sole writer over a pair of counters buffers.
///
/// The manager allocates counter records (reusing reclaimed ids before
/// issuing fresh ones), populates their metadata, frees them back to a
/// reuse pool, and writes counter values. It dereferences to
/// [`CountersReader`], so every read-side operation is available on the
/// manager as well.
///
/// Mutating operations take `&mut self`: within one process the borrow
/// checker enforces the single-writer discipline. Across processes it is
/// a caller contract; construct exactly one manager per buffer pair.
///
/// # Examples
///
/// ```rust
/// use registro::buffer::AlignedBuffer;
/// use registro::layout::{COUNTER_LENGTH, METADATA_LENGTH};
/// use registro::registry::CountersManager;
///
/// let metadata = AlignedBuffer::new(8 * METADATA_LENGTH);
/// let values = AlignedBuffer::new(8 * COUNTER_LENGTH);
/// let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());
///
/// let requests = manager.allocate("requests")?;
/// let errors = manager.allocate("errors")?;
///
/// manager.set_counter_value(requests, 10);
/// assert_eq!(manager.counter_value(requests), 10);
///
/// manager.free(errors);
/// // Reclaimed ids are reused before fresh ones.
/// assert_eq!(manager.allocate("retries")?, errors);
/// # Ok::<(), registro::registry::CountersError>(())
/// ```
///
/// Structured metadata goes in the record's key region, populated through
/// a bounded writer during allocation:
///
/// ```rust
/// # use registro::buffer::AlignedBuffer;
/// # use registro::layout::{COUNTER_LENGTH, METADATA_LENGTH};
/// # use registro::registry::CountersManager;
/// # let metadata = AlignedBuffer::new(8 * METADATA_LENGTH);
/// # let values = AlignedBuffer::new(8 * COUNTER_LENGTH);
/// # let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());
/// const SUBSCRIPTION_TYPE: i32 = 3;
///
/// let id = manager.allocate_with_key("sub-42/position", SUBSCRIPTION_TYPE, |key| {
///     key.put_i64(0, 42); // subscription id
///     key.put_i32(8, 7);  // stream id
///     Ok(())
/// })?;
/// # Ok::<(), registro::registry::CountersError>(())
/// ```
pub struct CountersManager<'a> {
    reader: CountersReader<'a>,
    free_list: VecDeque<i32>,
    high_water_mark: i32,
}

impl<'a> CountersManager<'a> {
    /// Constructs a manager over the metadata and values buffers.
    ///
    /// Labels encode as UTF-8. The buffers are expected to be zeroed on
    /// first use; a freshly mapped file or [`AlignedBuffer`] already is.
    ///
    /// [`AlignedBuffer`]: crate::buffer::AlignedBuffer
    pub fn new(metadata_buffer: AtomicBuffer<'a>, values_buffer: AtomicBuffer<'a>) -> Self {
        Self::with_encoding(metadata_buffer, values_buffer, LabelEncoding::Utf8)
    }

    /// Constructs a manager with an explicit label encoding.
    pub fn with_encoding(
        metadata_buffer: AtomicBuffer<'a>,
        values_buffer: AtomicBuffer<'a>,
        label_encoding: LabelEncoding,
    ) -> Self {
        Self {
            reader: CountersReader::with_encoding(metadata_buffer, values_buffer, label_encoding),
            free_list: VecDeque::new(),
            high_water_mark: 0,
        }
    }

    /// The read-only view over the same buffers.
    pub fn as_reader(&self) -> &CountersReader<'a> {
        &self.reader
    }

    /// Allocates a counter with the default type id and an empty key.
    ///
    /// Returns the id of the allocated record. Labels longer than
    /// [`MAX_LABEL_LENGTH`] bytes are truncated, not rejected.
    pub fn allocate(&mut self, label: &str) -> Result<i32, CountersError> {
        self.allocate_with_key(label, DEFAULT_TYPE_ID, |_| Ok(()))
    }

    /// Allocates a counter with a type id and a key populated by `key_fn`.
    ///
    /// The record becomes visible to concurrent readers only through the
    /// final Release store of its state field, after the type id, key,
    /// and label are all in place; a reader can never observe a
    /// half-populated record as allocated.
    ///
    /// If `key_fn` returns an error or panics, the claimed id is released
    /// back to the free-list before the failure propagates, so the very
    /// next allocation can reuse it. The record is never published in
    /// that case.
    ///
    /// # Errors
    ///
    /// [`CountersError::Exhausted`] when no record remains within buffer
    /// capacity; [`CountersError::KeyWriter`] wrapping whatever `key_fn`
    /// returned.
    pub fn allocate_with_key<F>(
        &mut self,
        label: &str,
        type_id: i32,
        key_fn: F,
    ) -> Result<i32, CountersError>
    where
        F: FnOnce(&mut KeyBuffer<'_>) -> Result<(), KeyWriterError>,
    {
        let counter_id = self.next_counter_id()?;
        let record_offset = metadata_offset(counter_id);

        let metadata = self.reader.metadata_buffer();
        let values = self.reader.values_buffer();
        let encoding = self.reader.label_encoding();

        // Any early exit from here on, error or unwind, must release the
        // claimed id; the guard re-arms the free-list until the record is
        // fully populated and published.
        let mut guard = ReleaseOnFailure {
            free_list: &mut self.free_list,
            counter_id,
            armed: true,
        };

        metadata.put_i32(record_offset + TYPE_ID_OFFSET, type_id);
        metadata.set_memory(record_offset + KEY_OFFSET, MAX_KEY_LENGTH, 0);
        values.put_i64_ordered(counter_offset(counter_id), 0);

        let mut key = KeyBuffer {
            buffer: metadata.view(record_offset + KEY_OFFSET, MAX_KEY_LENGTH),
        };
        key_fn(&mut key).map_err(CountersError::KeyWriter)?;

        let encoded = encoding.encode(label);
        let length = encoding.truncated_length(&encoded, MAX_LABEL_LENGTH);
        write_label(&metadata, record_offset, &encoded[..length]);

        metadata.put_i32_ordered(record_offset, RECORD_ALLOCATED);
        guard.armed = false;

        Ok(counter_id)
    }

    /// Allocates a counter from raw key and label bytes.
    ///
    /// Same allocation and state-machine rules as
    /// [`allocate_with_key`](CountersManager::allocate_with_key), with
    /// both regions supplied as byte slices: the key is copied up to
    /// [`MAX_KEY_LENGTH`] bytes, the label up to [`MAX_LABEL_LENGTH`]
    /// bytes. The label bytes are stored as given, with no re-encoding
    /// and byte-exact truncation; the caller is responsible for supplying
    /// bytes valid for the registry's encoding.
    pub fn allocate_raw(
        &mut self,
        type_id: i32,
        key: &[u8],
        label: &[u8],
    ) -> Result<i32, CountersError> {
        let counter_id = self.next_counter_id()?;
        let record_offset = metadata_offset(counter_id);

        let metadata = self.reader.metadata_buffer();
        let values = self.reader.values_buffer();

        metadata.put_i32(record_offset + TYPE_ID_OFFSET, type_id);
        metadata.set_memory(record_offset + KEY_OFFSET, MAX_KEY_LENGTH, 0);
        metadata.put_bytes(record_offset + KEY_OFFSET, &key[..key.len().min(MAX_KEY_LENGTH)]);
        values.put_i64_ordered(counter_offset(counter_id), 0);

        write_label(&metadata, record_offset, &label[..label.len().min(MAX_LABEL_LENGTH)]);

        metadata.put_i32_ordered(record_offset, RECORD_ALLOCATED);

        Ok(counter_id)
    }

    /// Allocates a counter and wraps its value slot in an
    /// [`AtomicCounter`] handle.
    pub fn new_counter(&mut self, label: &str) -> Result<AtomicCounter<'a>, CountersError> {
        let counter_id = self.allocate(label)?;
        Ok(AtomicCounter::new(self.reader.values_buffer(), counter_id))
    }

    /// Frees a counter record, making its id eligible for reuse.
    ///
    /// The record state moves to reclaimed with a Release store; the
    /// record never returns to the unused state, so enumeration keeps its
    /// cheap termination rule. Freeing an id that is not currently
    /// allocated is a caller error (debug-asserted, unspecified in
    /// release builds).
    pub fn free(&mut self, counter_id: i32) {
        let record_offset = metadata_offset(counter_id);
        debug_assert_eq!(
            self.reader.metadata_buffer().get_i32_volatile(record_offset),
            RECORD_ALLOCATED,
            "freeing counter {counter_id} which is not allocated",
        );
        self.reader
            .metadata_buffer()
            .put_i32_ordered(record_offset, RECORD_RECLAIMED);
        self.free_list.push_back(counter_id);
    }

    /// Writes a counter value with Release ordering.
    ///
    /// This is the single-writer mutation path; concurrent readers
    /// observe either the old or the new value, never a torn mixture.
    #[inline]
    pub fn set_counter_value(&mut self, counter_id: i32, value: i64) {
        self.reader
            .values_buffer()
            .put_i64_ordered(counter_offset(counter_id), value);
    }

    fn next_counter_id(&mut self) -> Result<i32, CountersError> {
        if let Some(counter_id) = self.free_list.pop_front() {
            return Ok(counter_id);
        }

        let counter_id = self.high_water_mark;
        if counter_id as usize >= self.reader.capacity() {
            return Err(CountersError::Exhausted {
                capacity: self.reader.capacity(),
            });
        }
        self.high_water_mark += 1;

        Ok(counter_id)
    }
}

impl<'a> Deref for CountersManager<'a> {
    type Target = CountersReader<'a>;

    fn deref(&self) -> &CountersReader<'a> {
        &self.reader
    }
}

impl std::fmt::Debug for CountersManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountersManager")
            .field("capacity", &self.reader.capacity())
            .field("high_water_mark", &self.high_water_mark)
            .field("free_list", &self.free_list)
            .finish()
    }
}

fn write_label(metadata: &AtomicBuffer<'_>, record_offset: usize, bytes: &[u8]) {
    metadata.put_i32(record_offset + LABEL_OFFSET, bytes.len() as i32);
    metadata.put_bytes(record_offset + LABEL_OFFSET + 4, bytes);
}

/// Returns a claimed counter id to the free-list unless disarmed.
///
/// Armed across the key-population callback so that both error returns
/// and unwinds leave the registry in a reusable state.
struct ReleaseOnFailure<'m> {
    free_list: &'m mut VecDeque<i32>,
    counter_id: i32,
    armed: bool,
}

impl Drop for ReleaseOnFailure<'_> {
    fn drop(&mut self) {
        if self.armed {
            // Front of the queue: the failed id is the first one reused.
            self.free_list.push_front(self.counter_id);
        }
    }
}

/// Mutable, bounded view over the key region of a record being allocated.
///
/// Handed to the key-population callback of
/// [`CountersManager::allocate_with_key`]. Writes are bounds-checked
/// against [`MAX_KEY_LENGTH`]; multi-byte values use native byte order,
/// matching what [`KeyView`](crate::registry::KeyView) reads back.
#[derive(Debug)]
pub struct KeyBuffer<'a> {
    buffer: AtomicBuffer<'a>,
}

impl KeyBuffer<'_> {
    /// The key capacity in bytes ([`MAX_KEY_LENGTH`]).
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Writes a 32-bit integer at `offset` within the key.
    pub fn put_i32(&mut self, offset: usize, value: i32) {
        self.buffer.put_bytes(offset, &value.to_ne_bytes());
    }

    /// Writes a 64-bit integer at `offset` within the key.
    pub fn put_i64(&mut self, offset: usize, value: i64) {
        self.buffer.put_bytes(offset, &value.to_ne_bytes());
    }

    /// Copies `src` into the key starting at `offset`.
    pub fn put_bytes(&mut self, offset: usize, src: &[u8]) {
        self.buffer.put_bytes(offset, src);
    }

    /// Writes any plain-old-data value at `offset` within the key.
    ///
    /// ```rust,ignore
    /// key.write(0, &subscription_id);
    /// key.write(8, &stream_id);
    /// ```
    pub fn write<T: bytemuck::NoUninit>(&mut self, offset: usize, value: &T) {
        self.buffer.put_bytes(offset, bytemuck::bytes_of(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;
    use crate::layout::{COUNTER_LENGTH, METADATA_LENGTH, RECORD_UNUSED};

    const NUMBER_OF_COUNTERS: usize = 4;

    fn buffers() -> (AlignedBuffer, AlignedBuffer) {
        (
            AlignedBuffer::new(NUMBER_OF_COUNTERS * METADATA_LENGTH),
            AlignedBuffer::new(NUMBER_OF_COUNTERS * COUNTER_LENGTH),
        )
    }

    fn labels(reader: &CountersReader<'_>) -> Vec<(i32, String)> {
        let mut seen = Vec::new();
        reader
            .for_each_label(|id, label| seen.push((id, label.to_owned())))
            .unwrap();
        seen
    }

    #[test]
    fn test_store_labels() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let counter_id = manager.allocate("abc").unwrap();

        let other = CountersReader::new(metadata.as_buffer(), values.as_buffer());
        assert_eq!(labels(&other), vec![(counter_id, "abc".to_owned())]);
    }

    #[test]
    fn test_store_multiple_labels_in_order() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let abc = manager.allocate("abc").unwrap();
        let def = manager.allocate("def").unwrap();
        let ghi = manager.allocate("ghi").unwrap();

        assert_eq!(
            labels(manager.as_reader()),
            vec![
                (abc, "abc".to_owned()),
                (def, "def".to_owned()),
                (ghi, "ghi".to_owned()),
            ]
        );
    }

    #[test]
    fn test_truncate_long_label() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let label = "x".repeat(MAX_LABEL_LENGTH + 10);
        let counter_id = manager.allocate(&label).unwrap();

        assert_eq!(
            labels(manager.as_reader()),
            vec![(counter_id, label[..MAX_LABEL_LENGTH].to_owned())]
        );
    }

    #[test]
    fn test_truncate_multibyte_label_at_char_boundary() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        // 'è' is two bytes; 190 of them exactly fill the label region, so
        // one more forces a truncation that must not split a character.
        let label = "è".repeat(191);
        manager.allocate(&label).unwrap();

        let stored = labels(manager.as_reader()).remove(0).1;
        assert_eq!(stored, "è".repeat(190));
    }

    #[test]
    fn test_free_and_reuse_counters() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let abc = manager.allocate("abc").unwrap();
        let def = manager.allocate("def").unwrap();
        let ghi = manager.allocate("ghi").unwrap();

        manager.free(def);

        assert_eq!(
            labels(manager.as_reader()),
            vec![(abc, "abc".to_owned()), (ghi, "ghi".to_owned())]
        );

        assert_eq!(manager.allocate("the next label").unwrap(), def);
    }

    #[test]
    fn test_example_scenario() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        manager.allocate("abc").unwrap();
        let def = manager.allocate("def").unwrap();
        manager.allocate("ghi").unwrap();

        manager.free(def);
        assert_eq!(
            labels(manager.as_reader()),
            vec![(0, "abc".to_owned()), (2, "ghi".to_owned())]
        );

        assert_eq!(manager.allocate("xyz").unwrap(), def);
        assert_eq!(
            labels(manager.as_reader()),
            vec![
                (0, "abc".to_owned()),
                (1, "xyz".to_owned()),
                (2, "ghi".to_owned()),
            ]
        );
    }

    #[test]
    fn test_not_over_allocate() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        manager.allocate("abc").unwrap();
        manager.allocate("def").unwrap();
        manager.allocate("ghi").unwrap();
        manager.allocate("jkl").unwrap();

        match manager.allocate("mno") {
            Err(CountersError::Exhausted { capacity }) => {
                assert_eq!(capacity, NUMBER_OF_COUNTERS);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_exhaustion_leaves_no_partial_state() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        for label in ["a", "b", "c", "d"] {
            manager.allocate(label).unwrap();
        }
        assert!(manager.allocate("overflow").is_err());
        assert!(manager.allocate("still overflow").is_err());

        // Freeing one record makes exactly one allocation possible again.
        manager.free(2);
        assert_eq!(manager.allocate("reused").unwrap(), 2);
        assert!(manager.allocate("overflow again").is_err());
    }

    #[test]
    fn test_key_writer_error_rolls_back() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let result = manager.allocate_with_key("label", DEFAULT_TYPE_ID, |_| {
            Err("key population went sideways".into())
        });
        assert!(matches!(result, Err(CountersError::KeyWriter(_))));

        // The claimed id was released: the next allocation reuses it and
        // the record was never published.
        let counter = manager.new_counter("new label").unwrap();
        assert_eq!(counter.id(), 0);
        assert_eq!(labels(manager.as_reader()), vec![(0, "new label".to_owned())]);
    }

    #[test]
    fn test_key_writer_panic_rolls_back() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            let _ = manager.allocate_with_key("label", DEFAULT_TYPE_ID, |_| {
                panic!("key writer panic")
            });
        }));
        assert!(panicked.is_err());

        assert_eq!(manager.allocate("after panic").unwrap(), 0);
        let state = metadata.as_buffer().get_i32_volatile(metadata_offset(0));
        assert_eq!(state, RECORD_ALLOCATED);
    }

    #[test]
    fn test_failed_allocation_never_publishes() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let _ = manager.allocate_with_key("label", DEFAULT_TYPE_ID, |_| Err("no".into()));

        let state = metadata.as_buffer().get_i32_volatile(metadata_offset(0));
        assert_eq!(state, RECORD_UNUSED);
        assert_eq!(labels(manager.as_reader()), vec![]);
    }

    #[test]
    fn test_store_metadata() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let id_one = manager
            .allocate_with_key("Test Label One", 333, |key| {
                key.put_i64(0, 777);
                Ok(())
            })
            .unwrap();
        let id_two = manager
            .allocate_with_key("Test Label Two", 222, |key| {
                key.put_i64(0, 444);
                Ok(())
            })
            .unwrap();

        let mut seen = Vec::new();
        manager
            .for_each_metadata(|id, type_id, key, label| {
                seen.push((id, type_id, key.get_i64(0), label.to_owned()));
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                (id_one, 333, 777, "Test Label One".to_owned()),
                (id_two, 222, 444, "Test Label Two".to_owned()),
            ]
        );
    }

    #[test]
    fn test_store_raw_data() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let id_one = manager
            .allocate_raw(333, &777i64.to_ne_bytes(), b"Test Label One")
            .unwrap();
        let id_two = manager
            .allocate_raw(222, &444i64.to_ne_bytes(), b"Test Label Two")
            .unwrap();

        let mut seen = Vec::new();
        manager
            .for_each_metadata(|id, type_id, key, label| {
                seen.push((id, type_id, key.get_i64(0), label.to_owned()));
            })
            .unwrap();

        assert_eq!(
            seen,
            vec![
                (id_one, 333, 777, "Test Label One".to_owned()),
                (id_two, 222, 444, "Test Label Two".to_owned()),
            ]
        );
    }

    #[test]
    fn test_allocate_raw_clamps_key_and_label() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let big_key = vec![0xAB; MAX_KEY_LENGTH + 40];
        let big_label = vec![b'y'; MAX_LABEL_LENGTH + 40];
        let id = manager.allocate_raw(1, &big_key, &big_label).unwrap();

        manager
            .for_each_metadata(|seen_id, _, key, label| {
                assert_eq!(seen_id, id);
                assert_eq!(label.len(), MAX_LABEL_LENGTH);
                let mut last = [0u8; 1];
                key.get_bytes(MAX_KEY_LENGTH - 1, &mut last);
                assert_eq!(last[0], 0xAB);
            })
            .unwrap();
    }

    #[test]
    fn test_store_and_load_value() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let counter_id = manager.allocate("Test Counter").unwrap();
        manager.set_counter_value(counter_id, 7);
        assert_eq!(manager.counter_value(counter_id), 7);

        // A reader over the same buffers sees the same value.
        let other = CountersReader::new(metadata.as_buffer(), values.as_buffer());
        assert_eq!(other.counter_value(counter_id), 7);
    }

    #[test]
    fn test_value_zeroed_on_reuse() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let id = manager.allocate("first life").unwrap();
        manager.set_counter_value(id, 123_456);
        manager.free(id);

        let reused = manager.allocate("second life").unwrap();
        assert_eq!(reused, id);
        assert_eq!(manager.counter_value(reused), 0);
    }

    #[test]
    fn test_key_zeroed_on_reuse() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let id = manager
            .allocate_with_key("first", 1, |key| {
                let filler = [0xFFu8; MAX_KEY_LENGTH];
                key.put_bytes(0, &filler);
                Ok(())
            })
            .unwrap();
        manager.free(id);

        let reused = manager.allocate("second").unwrap();
        assert_eq!(reused, id);

        manager
            .for_each_metadata(|_, _, key, _| {
                let mut bytes = [0u8; MAX_KEY_LENGTH];
                key.get_bytes(0, &mut bytes);
                assert!(bytes.iter().all(|&b| b == 0));
            })
            .unwrap();
    }

    #[test]
    fn test_free_list_is_fifo() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        for label in ["a", "b", "c", "d"] {
            manager.allocate(label).unwrap();
        }
        manager.free(2);
        manager.free(0);

        assert_eq!(manager.allocate("first reuse").unwrap(), 2);
        assert_eq!(manager.allocate("second reuse").unwrap(), 0);
    }

    #[test]
    fn test_ascii_encoding_replaces_non_ascii() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::with_encoding(
            metadata.as_buffer(),
            values.as_buffer(),
            LabelEncoding::Ascii,
        );

        manager.allocate("città").unwrap();
        assert_eq!(labels(manager.as_reader()).remove(0).1, "citt?");
    }

    #[test]
    fn test_new_counter_handle() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        manager.allocate("first").unwrap();
        let counter = manager.new_counter("second").unwrap();
        assert_eq!(counter.id(), 1);

        counter.set_ordered(0xF_FFFF_FFFF);
        assert_eq!(manager.counter_value(counter.id()), 0xF_FFFF_FFFF);
    }

    #[test]
    fn test_concurrent_reader_observes_publication() {
        use std::sync::Arc;
        use std::thread;

        let metadata = Arc::new(AlignedBuffer::new(64 * METADATA_LENGTH));
        let values = Arc::new(AlignedBuffer::new(64 * COUNTER_LENGTH));

        let reader_metadata = Arc::clone(&metadata);
        let reader_values = Arc::clone(&values);
        let observer = thread::spawn(move || {
            let reader =
                CountersReader::new(reader_metadata.as_buffer(), reader_values.as_buffer());
            // Spin until all records are visible; every label observed
            // along the way must be fully populated.
            loop {
                let mut count = 0;
                reader
                    .for_each_label(|id, label| {
                        assert_eq!(label, format!("counter-{id}"));
                        count += 1;
                    })
                    .unwrap();
                if count == 64 {
                    break;
                }
            }
        });

        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());
        for i in 0..64 {
            manager.allocate(&format!("counter-{i}")).unwrap();
        }

        observer.join().unwrap();
    }
}
