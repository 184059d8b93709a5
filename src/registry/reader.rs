//! Read-only view over the counters buffers.

use crate::buffer::AtomicBuffer;
use crate::layout::{
    counter_offset, metadata_offset, COUNTER_LENGTH, KEY_OFFSET, LABEL_OFFSET, MAX_KEY_LENGTH,
    METADATA_LENGTH, RECORD_ALLOCATED, RECORD_UNUSED, TYPE_ID_OFFSET,
};
use crate::layout::RecordState;
use crate::registry::{LabelDecodeError, LabelEncoding};

/// Read-only, thread-safe view over a metadata buffer and a values buffer.
///
/// Any number of readers may wrap the same underlying buffers, in the same
/// process as the writer or in another process that mapped the same
/// memory. A reader holds no mutable state of its own; it is safe to use
/// concurrently while a [`CountersManager`](crate::registry::CountersManager)
/// mutates the buffers, because every record is published with a Release
/// store of its state field and observed here with an Acquire load.
///
/// # Examples
///
/// ```rust
/// use registro::buffer::AlignedBuffer;
/// use registro::layout::{COUNTER_LENGTH, METADATA_LENGTH};
/// use registro::registry::{CountersManager, CountersReader};
///
/// let metadata = AlignedBuffer::new(4 * METADATA_LENGTH);
/// let values = AlignedBuffer::new(4 * COUNTER_LENGTH);
///
/// let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());
/// let id = manager.allocate("requests")?;
/// manager.set_counter_value(id, 42);
///
/// // A separate reader over the same memory observes the counter.
/// let reader = CountersReader::new(metadata.as_buffer(), values.as_buffer());
/// assert_eq!(reader.counter_value(id), 42);
///
/// reader.for_each_label(|id, label| {
///     println!("counter {id}: {label}");
/// })?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Counter id contract
///
/// Value and offset lookups take any id and bounds-check it against the
/// buffers, panicking like slice indexing when it is out of range. An id
/// that is in range but not currently allocated reads whatever bits are
/// present (zero for never-used slots, a stale value for reclaimed ones);
/// supplying ids obtained from allocation or enumeration is the caller's
/// responsibility.
#[derive(Debug, Clone, Copy)]
pub struct CountersReader<'a> {
    metadata_buffer: AtomicBuffer<'a>,
    values_buffer: AtomicBuffer<'a>,
    label_encoding: LabelEncoding,
}

impl<'a> CountersReader<'a> {
    /// Constructs a reader over the metadata and values buffers.
    ///
    /// Labels decode as UTF-8.
    pub fn new(metadata_buffer: AtomicBuffer<'a>, values_buffer: AtomicBuffer<'a>) -> Self {
        Self::with_encoding(metadata_buffer, values_buffer, LabelEncoding::Utf8)
    }

    /// Constructs a reader with an explicit label encoding.
    pub fn with_encoding(
        metadata_buffer: AtomicBuffer<'a>,
        values_buffer: AtomicBuffer<'a>,
        label_encoding: LabelEncoding,
    ) -> Self {
        Self {
            metadata_buffer,
            values_buffer,
            label_encoding,
        }
    }

    /// The buffer containing the counter metadata records.
    #[inline]
    pub fn metadata_buffer(&self) -> AtomicBuffer<'a> {
        self.metadata_buffer
    }

    /// The buffer containing the counter values.
    #[inline]
    pub fn values_buffer(&self) -> AtomicBuffer<'a> {
        self.values_buffer
    }

    /// The encoding used for label text.
    #[inline]
    pub fn label_encoding(&self) -> LabelEncoding {
        self.label_encoding
    }

    /// The number of counter records the buffers can hold.
    ///
    /// Bounded by whichever buffer runs out of full records first.
    pub fn capacity(&self) -> usize {
        (self.metadata_buffer.capacity() / METADATA_LENGTH)
            .min(self.values_buffer.capacity() / COUNTER_LENGTH)
    }

    /// The highest counter id the buffers can hold.
    pub fn max_counter_id(&self) -> i32 {
        self.capacity() as i32 - 1
    }

    /// The value of a counter, read with Acquire ordering.
    ///
    /// Always succeeds for in-range ids; see the [counter id
    /// contract](CountersReader#counter-id-contract).
    #[inline]
    pub fn counter_value(&self, counter_id: i32) -> i64 {
        self.values_buffer.get_i64_volatile(counter_offset(counter_id))
    }

    /// The allocation state of a record, read with Acquire ordering.
    ///
    /// Returns `None` when the state field holds a value outside the
    /// record state machine, which indicates the buffer does not contain
    /// a counters registry.
    pub fn counter_state(&self, counter_id: i32) -> Option<RecordState> {
        RecordState::from_raw(
            self.metadata_buffer
                .get_i32_volatile(metadata_offset(counter_id)),
        )
    }

    /// Iterates over the labels of all allocated counters in ascending id
    /// order.
    ///
    /// The scan reads each record state with Acquire ordering. Allocated
    /// records are decoded and passed to `consumer`; reclaimed records
    /// are skipped; the first never-used record ends the scan, since slot
    /// indices are handed out in ascending order and freeing never
    /// returns a record to the unused state.
    ///
    /// A label decode failure aborts the scan and propagates. A panic in
    /// `consumer` propagates as well.
    pub fn for_each_label<F>(&self, mut consumer: F) -> Result<(), LabelDecodeError>
    where
        F: FnMut(i32, &str),
    {
        let mut counter_id = 0;
        let capacity = self.metadata_buffer.capacity();
        let mut offset = 0;

        while offset + METADATA_LENGTH <= capacity {
            let record_state = self.metadata_buffer.get_i32_volatile(offset);

            if record_state == RECORD_ALLOCATED {
                let label = self.label(offset)?;
                consumer(counter_id, &label);
            } else if record_state == RECORD_UNUSED {
                break;
            }

            counter_id += 1;
            offset += METADATA_LENGTH;
        }

        Ok(())
    }

    /// Iterates over the full metadata of all allocated counters in
    /// ascending id order.
    ///
    /// Same scan and termination rule as [`for_each_label`], additionally
    /// passing the type id and a read-only [`KeyView`] over the record's
    /// key region.
    ///
    /// [`for_each_label`]: CountersReader::for_each_label
    pub fn for_each_metadata<F>(&self, mut consumer: F) -> Result<(), LabelDecodeError>
    where
        F: FnMut(i32, i32, KeyView<'a>, &str),
    {
        let mut counter_id = 0;
        let capacity = self.metadata_buffer.capacity();
        let mut offset = 0;

        while offset + METADATA_LENGTH <= capacity {
            let record_state = self.metadata_buffer.get_i32_volatile(offset);

            if record_state == RECORD_ALLOCATED {
                let type_id = self.metadata_buffer.get_i32(offset + TYPE_ID_OFFSET);
                let label = self.label(offset)?;
                let key = KeyView {
                    buffer: self.metadata_buffer.view(offset + KEY_OFFSET, MAX_KEY_LENGTH),
                };
                consumer(counter_id, type_id, key, &label);
            } else if record_state == RECORD_UNUSED {
                break;
            }

            counter_id += 1;
            offset += METADATA_LENGTH;
        }

        Ok(())
    }

    /// The offset in the values buffer of the record for a counter id.
    #[inline]
    pub fn counter_offset(counter_id: i32) -> usize {
        counter_offset(counter_id)
    }

    /// The offset in the metadata buffer of the record for a counter id.
    #[inline]
    pub fn metadata_offset(counter_id: i32) -> usize {
        metadata_offset(counter_id)
    }

    fn label(&self, record_offset: usize) -> Result<String, LabelDecodeError> {
        let label_length = self.metadata_buffer.get_i32(record_offset + LABEL_OFFSET);
        let mut bytes = vec![0u8; label_length.max(0) as usize];
        self.metadata_buffer
            .get_bytes(record_offset + LABEL_OFFSET + 4, &mut bytes);
        self.label_encoding.decode(&bytes)
    }
}

/// Read-only view over the key region of an allocated metadata record.
///
/// The key holds up to [`MAX_KEY_LENGTH`] bytes of caller-defined
/// structured data, written once at allocation time and immutable until
/// the record is freed. Multi-byte values use native byte order, matching
/// what [`KeyBuffer`](crate::registry::KeyBuffer) wrote.
#[derive(Debug, Clone, Copy)]
pub struct KeyView<'a> {
    buffer: AtomicBuffer<'a>,
}

impl KeyView<'_> {
    /// The key capacity in bytes ([`MAX_KEY_LENGTH`]).
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Reads a 32-bit integer at `offset` within the key.
    pub fn get_i32(&self, offset: usize) -> i32 {
        let mut bytes = [0u8; 4];
        self.buffer.get_bytes(offset, &mut bytes);
        i32::from_ne_bytes(bytes)
    }

    /// Reads a 64-bit integer at `offset` within the key.
    pub fn get_i64(&self, offset: usize) -> i64 {
        let mut bytes = [0u8; 8];
        self.buffer.get_bytes(offset, &mut bytes);
        i64::from_ne_bytes(bytes)
    }

    /// Copies `dst.len()` key bytes starting at `offset` into `dst`.
    pub fn get_bytes(&self, offset: usize, dst: &mut [u8]) {
        self.buffer.get_bytes(offset, dst);
    }

    /// Reads any plain-old-data value at `offset` within the key.
    ///
    /// ```rust,ignore
    /// let channel: u64 = key.read(0);
    /// let session: i32 = key.read(8);
    /// ```
    pub fn read<T: bytemuck::AnyBitPattern>(&self, offset: usize) -> T {
        let mut bytes = vec![0u8; std::mem::size_of::<T>()];
        self.buffer.get_bytes(offset, &mut bytes);
        bytemuck::pod_read_unaligned(&bytes)
    }
}
