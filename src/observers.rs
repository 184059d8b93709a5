//! Observer implementations for exporting the registry's contents.
//!
//! This module provides ways to observe and export the currently
//! allocated counters of a [`CountersReader`](crate::registry::CountersReader):
//!
//! - [`table`] - Pretty-print the registry as a table using the `tabled` crate
//! - [`prometheus`] - Export counters in Prometheus exposition format
//!
//! Observers are read-side consumers: they enumerate the registry the
//! same way any monitoring process would, and never mutate it.
//!
//! # Unified Error Handling
//!
//! All observers use a unified [`ObserverError`] type, allowing you to
//! switch between observers without changing error handling code.
//!
//! # Feature Flags
//!
//! Each observer is gated behind a feature flag to minimize dependencies:
//!
//! - `table` - Enables the [`table`] module
//! - `prometheus` - Enables the [`prometheus`] module
//! - `full` - Enables all observer modules
//!
//! # Example
//!
//! ```rust,ignore
//! use registro::observers::Result;
//! use registro::registry::CountersReader;
//!
//! fn export_metrics(reader: &CountersReader<'_>) -> Result<()> {
//!     #[cfg(feature = "table")]
//!     {
//!         use registro::observers::table::TableObserver;
//!         println!("{}", TableObserver::new().render(reader)?);
//!     }
//!
//!     #[cfg(feature = "prometheus")]
//!     {
//!         use registro::observers::prometheus::PrometheusObserver;
//!         let output = PrometheusObserver::new().render(reader)?;
//!         println!("{}", output);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod error;

pub use error::{ObserverError, Result};

#[cfg(feature = "prometheus")]
pub use error::PrometheusError;

#[cfg(feature = "table")]
pub mod table;

#[cfg(feature = "prometheus")]
pub mod prometheus;
