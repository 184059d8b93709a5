//! Byte-exact layout of the counters metadata and values buffers.
//!
//! Every other module in this crate relies on the geometry defined here.
//! The two buffers are indexed in lockstep: a counter id selects both a
//! value record and a metadata record, at `id * COUNTER_LENGTH` and
//! `id * METADATA_LENGTH` respectively.
//!
//! # Values Buffer
//!
//! ```text
//!   0                   1                   2                   3
//!   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                        Counter Value                          |
//!  |                                                               |
//!  +---------------------------------------------------------------+
//!  |                     120 bytes of padding                     ...
//! ...                                                              |
//!  +---------------------------------------------------------------+
//!  |                   Repeats to end of buffer                   ...
//!  |                                                               |
//! ...                                                              |
//!  +---------------------------------------------------------------+
//! ```
//!
//! Each value record spans two full cache lines so that adjacent counters
//! never share a line. Without the padding, two independent counters
//! updated from different cores would invalidate each other's cache line
//! on every write (false sharing).
//!
//! # Metadata Buffer
//!
//! ```text
//!   0                   1                   2                   3
//!   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//!  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!  |                        Record State                           |
//!  +---------------------------------------------------------------+
//!  |                          Type Id                              |
//!  +---------------------------------------------------------------+
//!  |                      120 bytes for key                       ...
//! ...                                                              |
//!  +---------------------------------------------------------------+
//!  |                       Label Length                            |
//!  +---------------------------------------------------------------+
//!  |                     380 bytes of Label                       ...
//! ...                                                              |
//!  +---------------------------------------------------------------+
//!  |                   Repeats to end of buffer                   ...
//!  |                                                               |
//! ...                                                              |
//!  +---------------------------------------------------------------+
//! ```
//!
//! The record state is the publication point: it is written with Release
//! ordering only after every other field of the record, and read with
//! Acquire ordering, so a reader that observes [`RecordState::Allocated`]
//! is guaranteed to see the fully populated type id, key, and label.

/// Length of a CPU cache line in bytes.
///
/// 64 bytes is correct for every mainstream x86-64 and AArch64 part. The
/// layout bakes this value into the record geometry, so it is a wire-format
/// constant rather than something probed at runtime.
pub const CACHE_LINE_LENGTH: usize = 64;

/// Length of a value record: an 8-byte counter plus padding to two full
/// cache lines, so adjacent counters never false-share.
pub const COUNTER_LENGTH: usize = CACHE_LINE_LENGTH * 2;

/// Offset within a metadata record at which the type id field is stored.
pub const TYPE_ID_OFFSET: usize = 4;

/// Offset within a metadata record at which the key region begins.
pub const KEY_OFFSET: usize = TYPE_ID_OFFSET + 4;

/// Maximum length in bytes of a counter key.
///
/// The state, type id, and key together fill the first two cache lines of
/// the record.
pub const MAX_KEY_LENGTH: usize = (CACHE_LINE_LENGTH * 2) - (4 * 2);

/// Offset within a metadata record at which the label region begins.
pub const LABEL_OFFSET: usize = CACHE_LINE_LENGTH * 2;

/// Length of the label region including its 32-bit length prefix.
pub const FULL_LABEL_LENGTH: usize = CACHE_LINE_LENGTH * 6;

/// Maximum length in bytes of a counter label, not including the prefix.
pub const MAX_LABEL_LENGTH: usize = FULL_LABEL_LENGTH - 4;

/// Length of a metadata record in bytes.
pub const METADATA_LENGTH: usize = LABEL_OFFSET + FULL_LABEL_LENGTH;

/// Record state value: the slot has never been allocated.
pub const RECORD_UNUSED: i32 = 0;

/// Record state value: the slot is currently allocated.
pub const RECORD_ALLOCATED: i32 = 1;

/// Record state value: the slot was allocated and has since been freed.
pub const RECORD_RECLAIMED: i32 = -1;

const _: () = assert!(COUNTER_LENGTH % CACHE_LINE_LENGTH == 0);
const _: () = assert!(METADATA_LENGTH % CACHE_LINE_LENGTH == 0);
const _: () = assert!(KEY_OFFSET + MAX_KEY_LENGTH == LABEL_OFFSET);

/// Allocation status of a metadata record.
///
/// A slot starts [`Unused`](RecordState::Unused), becomes
/// [`Allocated`](RecordState::Allocated) on first use, and alternates
/// between [`Reclaimed`](RecordState::Reclaimed) and
/// [`Allocated`](RecordState::Allocated) from then on. `Unused` is never
/// re-entered: the enumeration scan treats the first unused record as the
/// end of the ever-used range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RecordState {
    /// The slot has never been allocated.
    Unused = RECORD_UNUSED,
    /// The slot is currently allocated.
    Allocated = RECORD_ALLOCATED,
    /// The slot was allocated and has since been freed; eligible for reuse.
    Reclaimed = RECORD_RECLAIMED,
}

impl RecordState {
    /// Converts a raw state field value into a `RecordState`.
    ///
    /// Returns `None` for values outside the state machine, which can only
    /// appear if the buffer holds something other than a counters registry.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            RECORD_UNUSED => Some(RecordState::Unused),
            RECORD_ALLOCATED => Some(RecordState::Allocated),
            RECORD_RECLAIMED => Some(RecordState::Reclaimed),
            _ => None,
        }
    }

    /// Returns the raw i32 stored in the record state field.
    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

/// The offset in the values buffer of the record for a counter id.
#[inline]
pub const fn counter_offset(counter_id: i32) -> usize {
    counter_id as usize * COUNTER_LENGTH
}

/// The offset in the metadata buffer of the record for a counter id.
#[inline]
pub const fn metadata_offset(counter_id: i32) -> usize {
    counter_id as usize * METADATA_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lengths() {
        assert_eq!(COUNTER_LENGTH, 128);
        assert_eq!(METADATA_LENGTH, 512);
        assert_eq!(MAX_KEY_LENGTH, 120);
        assert_eq!(MAX_LABEL_LENGTH, 380);
        assert_eq!(LABEL_OFFSET, KEY_OFFSET + MAX_KEY_LENGTH);
    }

    #[test]
    fn test_counter_offset() {
        assert_eq!(counter_offset(0), 0);
        assert_eq!(counter_offset(1), 128);
        assert_eq!(counter_offset(7), 7 * 128);
    }

    #[test]
    fn test_metadata_offset() {
        assert_eq!(metadata_offset(0), 0);
        assert_eq!(metadata_offset(1), 512);
        assert_eq!(metadata_offset(3), 3 * 512);
    }

    #[test]
    fn test_record_state_round_trip() {
        for state in [
            RecordState::Unused,
            RecordState::Allocated,
            RecordState::Reclaimed,
        ] {
            assert_eq!(RecordState::from_raw(state.as_raw()), Some(state));
        }
    }

    #[test]
    fn test_record_state_from_raw_invalid() {
        assert_eq!(RecordState::from_raw(2), None);
        assert_eq!(RecordState::from_raw(-2), None);
        assert_eq!(RecordState::from_raw(i32::MAX), None);
    }
}
