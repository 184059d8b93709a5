//! Core registry types: the single-writer manager, the read-only view,
//! and the per-slot counter handle.
//!
//! # Architecture
//!
//! The registry is a passive shared-memory structure. It runs no threads
//! of its own; correctness under concurrency comes entirely from the
//! publication protocol over the record state field:
//!
//! ```text
//!   Writer process/thread                 Reader processes/threads
//!  ┌─────────────────────┐              ┌───────────────────────────┐
//!  │   CountersManager   │              │ CountersReader (any #)    │
//!  │  allocate / free    │              │ for_each_* / counter_value│
//!  └──────────┬──────────┘              └─────────────┬─────────────┘
//!             │ write fields, then                    │ Acquire-load state,
//!             │ Release-store state                   │ then read fields
//!             ▼                                       ▼
//!  ┌─────────────────────────────────────────────────────────────────┐
//!  │   metadata buffer                       values buffer           │
//!  │   [state|type|key|label] x N            [value|padding] x N     │
//!  └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A reader that observes `ALLOCATED` through the Acquire load is
//! guaranteed to see the type id, key, and label bytes written before the
//! Release store, so those fields can be read with plain loads.
//!
//! # Record state machine
//!
//! ```text
//!   UNUSED ──allocate──► ALLOCATED ──free──► RECLAIMED
//!                            ▲                   │
//!                            └─────allocate──────┘
//! ```
//!
//! `UNUSED` is entered exactly once per slot, in ascending id order, and
//! never re-entered; the enumeration scan stops at the first unused
//! record. Reclaimed ids go on a free-list and are reused before any
//! fresh id is issued.
//!
//! # Write discipline
//!
//! Exactly one owner may call the mutating operations (`allocate`,
//! `free`, `set_counter_value`) at a time. This is a caller contract: the
//! manager takes `&mut self` on those paths, which enforces it within one
//! process, but nothing stops a second process from mapping the same file
//! and constructing its own manager. Don't.

mod counter;
mod manager;
mod reader;

pub use counter::AtomicCounter;
pub use manager::{CountersManager, KeyBuffer, KeyWriterError};
pub use reader::{CountersReader, KeyView};

use std::borrow::Cow;
use thiserror::Error;

/// Type id assigned by [`CountersManager::allocate`] when the caller does
/// not provide one.
pub const DEFAULT_TYPE_ID: i32 = 0;

/// Error type for registry write operations.
#[derive(Debug, Error)]
pub enum CountersError {
    /// No reclaimed or never-used record remains within buffer capacity.
    ///
    /// Fatal to the allocation that hit it; the registry itself is left
    /// unchanged. Free an existing counter or size the buffers larger.
    #[error("counters exhausted: all {capacity} records are in use")]
    Exhausted {
        /// Total number of records the buffers can hold.
        capacity: usize,
    },

    /// The key-population callback returned an error.
    ///
    /// The allocation was rolled back: the claimed id is back on the
    /// free-list and the record was never published as allocated.
    #[error("key writer failed: {0}")]
    KeyWriter(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored label could not be decoded with the configured encoding.
    #[error(transparent)]
    LabelDecode(#[from] LabelDecodeError),
}

/// Error decoding stored label bytes with the configured encoding.
///
/// Decode failures propagate from the enumeration call that hit them,
/// aborting the remainder of the scan; they are never swallowed.
#[derive(Debug, Error)]
pub enum LabelDecodeError {
    /// The stored bytes are not valid UTF-8.
    #[error("label bytes are not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The stored bytes contain a byte outside the ASCII range.
    #[error("label contains non-ASCII byte {byte:#04x} at position {position}")]
    NonAscii {
        /// The offending byte.
        byte: u8,
        /// Its position within the label.
        position: usize,
    },
}

/// Text encoding used for counter labels.
///
/// UTF-8 is the default. ASCII is available for registries whose labels
/// are known to be ASCII-only; its decode path is a single range scan
/// instead of full UTF-8 validation, which matters when enumeration runs
/// on a monitoring hot path.
///
/// # Encoding
///
/// Labels are Rust strings and therefore already UTF-8. Encoding with
/// [`LabelEncoding::Ascii`] replaces any non-ASCII character with `?`
/// rather than failing, so a stray label never aborts an allocation.
/// Decoding is strict in both encodings: bytes that are invalid for the
/// configured encoding surface as [`LabelDecodeError`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelEncoding {
    /// Labels are UTF-8 text (default).
    #[default]
    Utf8,
    /// Labels are ASCII-only text.
    Ascii,
}

impl LabelEncoding {
    /// Encodes a label to bytes.
    ///
    /// Borrows when no transformation is needed, which is the common case
    /// for both encodings.
    pub(crate) fn encode<'s>(&self, label: &'s str) -> Cow<'s, [u8]> {
        match self {
            LabelEncoding::Utf8 => Cow::Borrowed(label.as_bytes()),
            LabelEncoding::Ascii => {
                if label.is_ascii() {
                    Cow::Borrowed(label.as_bytes())
                } else {
                    Cow::Owned(
                        label
                            .chars()
                            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                            .collect(),
                    )
                }
            }
        }
    }

    /// Decodes stored label bytes.
    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<String, LabelDecodeError> {
        match self {
            LabelEncoding::Utf8 => Ok(std::str::from_utf8(bytes)?.to_owned()),
            LabelEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                // ASCII is a UTF-8 subset, so this conversion cannot fail.
                None => Ok(std::str::from_utf8(bytes)?.to_owned()),
                Some(position) => Err(LabelDecodeError::NonAscii {
                    byte: bytes[position],
                    position,
                }),
            },
        }
    }

    /// The longest prefix of `bytes` that fits in `max` bytes without
    /// splitting a character of this encoding.
    pub(crate) fn truncated_length(&self, bytes: &[u8], max: usize) -> usize {
        if bytes.len() <= max {
            return bytes.len();
        }
        match self {
            LabelEncoding::Ascii => max,
            LabelEncoding::Utf8 => {
                // Back up past any UTF-8 continuation bytes so the stored
                // prefix stays decodable.
                let mut len = max;
                while len > 0 && bytes[len] & 0b1100_0000 == 0b1000_0000 {
                    len -= 1;
                }
                len
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_utf8_borrows() {
        let encoded = LabelEncoding::Utf8.encode("città");
        assert!(matches!(encoded, Cow::Borrowed(_)));
        assert_eq!(&*encoded, "città".as_bytes());
    }

    #[test]
    fn test_encode_ascii_replaces() {
        let encoded = LabelEncoding::Ascii.encode("città");
        assert_eq!(&*encoded, b"citt?");
    }

    #[test]
    fn test_encode_ascii_borrows_when_clean() {
        let encoded = LabelEncoding::Ascii.encode("plain");
        assert!(matches!(encoded, Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_utf8() {
        assert_eq!(
            LabelEncoding::Utf8.decode("città".as_bytes()).unwrap(),
            "città"
        );
    }

    #[test]
    fn test_decode_utf8_invalid() {
        let err = LabelEncoding::Utf8.decode(&[0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, LabelDecodeError::Utf8(_)));
    }

    #[test]
    fn test_decode_ascii_rejects_high_bytes() {
        let err = LabelEncoding::Ascii.decode(&[b'a', 0x80, b'b']).unwrap_err();
        match err {
            LabelDecodeError::NonAscii { byte, position } => {
                assert_eq!(byte, 0x80);
                assert_eq!(position, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_length_ascii() {
        assert_eq!(LabelEncoding::Ascii.truncated_length(b"abcdef", 4), 4);
        assert_eq!(LabelEncoding::Ascii.truncated_length(b"ab", 4), 2);
    }

    #[test]
    fn test_truncated_length_utf8_respects_boundaries() {
        let bytes = "aàb".as_bytes(); // 'à' is two bytes at index 1..3
        assert_eq!(LabelEncoding::Utf8.truncated_length(bytes, 2), 1);
        assert_eq!(LabelEncoding::Utf8.truncated_length(bytes, 3), 3);
    }
}
