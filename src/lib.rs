//! # Registro - Shared-Memory Counters Registry
//!
//! A Rust library providing a fixed-layout, lock-free counters registry:
//! one buffer of 64-bit counter values and one buffer of counter metadata
//! (labels, type tags, arbitrary keys) that a single writer mutates while
//! any number of readers observe concurrently - across threads or, via a
//! memory-mapped region, across processes.
//!
//! ## The Problem
//!
//! A running system wants to expose live numeric metrics - queue depths,
//! stream positions, error counts - to external monitoring tools. The
//! usual options all tax the hot path: logging serializes, RPC allocates
//! and blocks, and a mutex-protected table makes every observation a
//! synchronization point between the system and its monitors.
//!
//! ## The Solution: a shared-memory registry
//!
//! This library keeps counters in two raw, fixed-capacity buffers with a
//! byte-exact layout (see [`layout`]). The writer updates a counter with
//! a single ordered 64-bit store; readers poll with ordered loads and
//! never take a lock, allocate, or serialize anything. Monitoring tools
//! in other processes map the same memory and construct their own
//! read-only view over it.
//!
//! ### Design Principles
//!
//! 1. **Single writer, many readers**: one [`CountersManager`] owns all
//!    mutation; any number of [`CountersReader`]s observe the same
//!    memory. No operation blocks, and nothing is enforced with locks.
//!
//! 2. **Publish by state flag**: a metadata record becomes visible
//!    through one Release store of its state field, made only after the
//!    type id, key, and label are written. A reader that Acquire-loads
//!    the state and sees "allocated" can read everything else with plain
//!    loads.
//!
//! 3. **Cache-line padding**: each value record occupies two full cache
//!    lines, so counters updated from different cores never false-share.
//!
//! 4. **Stable integer ids**: a counter id is an index into both buffers
//!    at once. Freed ids are reclaimed through a free-list and reused
//!    before any fresh id is issued, keeping the id space dense and the
//!    enumeration scan linear with a cheap termination rule.
//!
//! [`CountersManager`]: registry::CountersManager
//! [`CountersReader`]: registry::CountersReader
//!
//! ## Quick Start
//!
//! ```rust
//! use registro::buffer::AlignedBuffer;
//! use registro::layout::{COUNTER_LENGTH, METADATA_LENGTH};
//! use registro::registry::{CountersManager, CountersReader};
//!
//! // Back the registry with ordinary process memory (a mapped file
//! // works the same way; see the `mmap` feature).
//! let metadata = AlignedBuffer::new(64 * METADATA_LENGTH);
//! let values = AlignedBuffer::new(64 * COUNTER_LENGTH);
//!
//! let mut manager = CountersManager::new(metadata.as_buffer(), values.as_buffer());
//!
//! let received = manager.allocate("messages received")?;
//! manager.set_counter_value(received, 128);
//!
//! // Observers construct independent readers over the same buffers.
//! let reader = CountersReader::new(metadata.as_buffer(), values.as_buffer());
//! reader.for_each_label(|id, label| {
//!     println!("{label}: {}", reader.counter_value(id));
//! })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Counter lifecycle
//!
//! | State | Meaning |
//! |-------|---------|
//! | `UNUSED` | Slot has never been allocated; ends the enumeration scan |
//! | `ALLOCATED` | Slot is live; enumerated and readable |
//! | `RECLAIMED` | Slot was freed; skipped by enumeration, id eligible for reuse |
//!
//! Slots leave `UNUSED` exactly once, in ascending id order, and never
//! return to it. See [`registry`] for the full state machine and
//! concurrency contract.
//!
//! ## Thread Safety
//!
//! Readers are `Send + Sync` and may run concurrently with the writer
//! without any coordination. The manager's mutating operations take
//! `&mut self`; one writer at a time is a caller contract that the
//! borrow checker enforces in-process and documentation enforces across
//! processes.
//!
//! ## Memory Usage
//!
//! Each counter costs 128 bytes of value space (8 bytes of value, the
//! rest false-sharing padding) and 512 bytes of metadata. Both buffers
//! are sized at construction and never grow; when every record is in
//! use, allocation fails with a resource-exhaustion error.
//!
//! ## Observers
//!
//! Optional observer modules export the registry's contents in various
//! formats. Each is gated behind a feature flag:
//!
//! | Feature | Module | Description |
//! |---------|--------|-------------|
//! | `table` | [`observers::table`] | Pretty-print the registry as an ASCII table |
//! | `prometheus` | [`observers::prometheus`] | Export in Prometheus exposition format |
//! | `serde`/`json` | [`snapshot`] | Serializable point-in-time snapshots |
//! | `mmap` | [`mapped`] | File-backed buffers shared across processes |
//! | `full` | All of the above | |

pub mod buffer;
pub mod layout;
pub mod registry;

pub mod observers;

#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "mmap")]
pub mod mapped;
