//! Snapshot types for serializing registry state.
//!
//! This module provides serializable snapshot types that capture the
//! currently allocated counters of a
//! [`CountersReader`](crate::registry::CountersReader) at a point in
//! time, for storage or export in any serde-compatible format.
//!
//! A snapshot is an ordinary owned value: unlike the registry itself it
//! survives the backing buffers, can cross the network, and can be
//! diffed against an earlier capture.
//!
//! # Feature Flag
//!
//! This module requires the `serde` feature:
//!
//! ```toml
//! [dependencies]
//! registro = { version = "0.2", features = ["serde"] }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use registro::snapshot::RegistrySnapshot;
//!
//! let snapshot = RegistrySnapshot::capture(&reader)?;
//!
//! // Serialize with any serde-compatible format
//! let json = serde_json::to_string(&snapshot)?;
//! ```

use crate::registry::{CountersReader, LabelDecodeError};
use serde::{Deserialize, Serialize};

/// A snapshot of a single allocated counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// The counter id.
    pub id: i32,
    /// The caller-defined type tag.
    pub type_id: i32,
    /// The decoded label.
    pub label: String,
    /// The counter value at capture time.
    pub value: i64,
}

/// A point-in-time capture of all allocated counters in a registry.
///
/// # Examples
///
/// ```rust,ignore
/// use registro::snapshot::RegistrySnapshot;
///
/// let before = RegistrySnapshot::capture(&reader)?;
/// // ... let the system run ...
/// let after = RegistrySnapshot::capture(&reader)?;
///
/// let delta = after.get("messages received").unwrap().value
///     - before.get("messages received").unwrap().value;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Optional timestamp in milliseconds since Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
    /// The counter snapshots, in ascending id order.
    pub counters: Vec<CounterSnapshot>,
}

impl RegistrySnapshot {
    /// Captures all allocated counters of a registry.
    ///
    /// Each value is read with the same ordered load any observer uses,
    /// after its record's state was Acquire-loaded, so every entry is a
    /// fully published record. The snapshot as a whole is not an atomic
    /// transaction across counters: values written during the scan may
    /// land in either this capture or the next.
    pub fn capture(reader: &CountersReader<'_>) -> Result<Self, LabelDecodeError> {
        let mut counters = Vec::new();
        reader.for_each_metadata(|id, type_id, _key, label| {
            counters.push(CounterSnapshot {
                id,
                type_id,
                label: label.to_owned(),
                value: reader.counter_value(id),
            });
        })?;

        Ok(Self {
            timestamp_ms: None,
            counters,
        })
    }

    /// Captures all allocated counters with a caller-supplied timestamp.
    pub fn capture_with_timestamp(
        reader: &CountersReader<'_>,
        timestamp_ms: u64,
    ) -> Result<Self, LabelDecodeError> {
        let mut snapshot = Self::capture(reader)?;
        snapshot.timestamp_ms = Some(timestamp_ms);
        Ok(snapshot)
    }

    /// Finds a counter by label.
    ///
    /// Returns the first match in id order when several counters share a
    /// label.
    pub fn get(&self, label: &str) -> Option<&CounterSnapshot> {
        self.counters.iter().find(|c| c.label == label)
    }

    /// Finds a counter by id.
    pub fn get_by_id(&self, id: i32) -> Option<&CounterSnapshot> {
        self.counters.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::AlignedBuffer;
    use crate::layout::{COUNTER_LENGTH, METADATA_LENGTH};
    use crate::registry::CountersManager;

    fn buffers() -> (AlignedBuffer, AlignedBuffer) {
        (
            AlignedBuffer::new(8 * METADATA_LENGTH),
            AlignedBuffer::new(8 * COUNTER_LENGTH),
        )
    }

    #[test]
    fn test_capture() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let requests = manager.allocate("requests").unwrap();
        let errors = manager.allocate_with_key("errors", 5, |_| Ok(())).unwrap();
        manager.set_counter_value(requests, 100);
        manager.set_counter_value(errors, 3);

        let snapshot = RegistrySnapshot::capture(manager.as_reader()).unwrap();

        assert_eq!(snapshot.counters.len(), 2);
        assert!(snapshot.timestamp_ms.is_none());
        assert_eq!(
            snapshot.counters[0],
            CounterSnapshot {
                id: requests,
                type_id: 0,
                label: "requests".to_owned(),
                value: 100,
            }
        );
        assert_eq!(snapshot.counters[1].type_id, 5);
    }

    #[test]
    fn test_capture_skips_reclaimed() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        manager.allocate("kept").unwrap();
        let freed = manager.allocate("freed").unwrap();
        manager.free(freed);

        let snapshot = RegistrySnapshot::capture(manager.as_reader()).unwrap();
        assert_eq!(snapshot.counters.len(), 1);
        assert_eq!(snapshot.counters[0].label, "kept");
    }

    #[test]
    fn test_capture_with_timestamp() {
        let (metadata, values) = buffers();
        let manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let snapshot =
            RegistrySnapshot::capture_with_timestamp(manager.as_reader(), 1234567890).unwrap();
        assert_eq!(snapshot.timestamp_ms, Some(1234567890));
    }

    #[test]
    fn test_get() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        manager.allocate("foo").unwrap();
        let bar = manager.allocate("bar").unwrap();
        manager.set_counter_value(bar, 7);

        let snapshot = RegistrySnapshot::capture(manager.as_reader()).unwrap();
        assert_eq!(snapshot.get("bar").unwrap().value, 7);
        assert!(snapshot.get("baz").is_none());
        assert_eq!(snapshot.get_by_id(bar).unwrap().label, "bar");
        assert!(snapshot.get_by_id(99).is_none());
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_serialize_round_trip() {
        let (metadata, values) = buffers();
        let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());

        let id = manager.allocate("requests").unwrap();
        manager.set_counter_value(id, 42);

        let snapshot = RegistrySnapshot::capture(manager.as_reader()).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("requests"));
        assert!(json.contains("42"));

        let decoded: RegistrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_deserialize() {
        let json = r#"{"timestamp_ms":99,"counters":[{"id":0,"type_id":3,"label":"a","value":1}]}"#;
        let snapshot: RegistrySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.timestamp_ms, Some(99));
        assert_eq!(snapshot.counters.len(), 1);
        assert_eq!(snapshot.counters[0].type_id, 3);
    }
}
