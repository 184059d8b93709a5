//! Prometheus observer for exporting the registry using the official
//! `prometheus` crate.
//!
//! This module provides [`PrometheusObserver`], which exports the
//! currently allocated counters of a
//! [`CountersReader`](crate::registry::CountersReader) to a Prometheus
//! [`Registry`](prometheus::Registry) and renders them using the official
//! Prometheus text format.
//!
//! # Feature Flag
//!
//! This module requires the `prometheus` feature:
//!
//! ```toml
//! [dependencies]
//! registro = { version = "0.2", features = ["prometheus"] }
//! ```
//!
//! # How It Works
//!
//! Each render is a point-in-time scan: the observer enumerates the
//! registry, creates one `IntGauge` per allocated counter in a fresh
//! Prometheus registry, and encodes the result with
//! [`TextEncoder`](prometheus::TextEncoder). Counter labels become metric
//! names (sanitized to the Prometheus charset); the counter id and type
//! id are attached as metric labels, which also keeps two counters with
//! identical text labels distinguishable.
//!
//! # Integration with Prometheus
//!
//! 1. Create a `PrometheusObserver` over your reader
//! 2. Call `render()` to get the exposition format string
//! 3. Serve this string on an HTTP `/metrics` endpoint
//! 4. Configure Prometheus to scrape your endpoint
//!
//! # Examples
//!
//! ```rust,ignore
//! use registro::observers::prometheus::PrometheusObserver;
//!
//! let observer = PrometheusObserver::new()
//!     .with_namespace("myapp")
//!     .with_const_label("instance", "localhost:8080");
//!
//! let output = observer.render(&reader)?;
//! println!("{}", output);
//! ```

use crate::observers::{PrometheusError, Result};
use crate::registry::CountersReader;
use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};
use std::collections::HashMap;

/// An observer that exports the registry in Prometheus exposition format.
///
/// Stateless between renders: every call to [`render`] scans the
/// registry afresh, so counters allocated or freed since the previous
/// render are picked up automatically.
///
/// [`render`]: PrometheusObserver::render
#[derive(Debug, Clone, Default)]
pub struct PrometheusObserver {
    namespace: Option<String>,
    const_labels: HashMap<String, String>,
}

impl PrometheusObserver {
    /// Creates a new observer with no namespace and no constant labels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the namespace prepended to every metric name.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Adds a constant label attached to every exported metric.
    pub fn with_const_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.insert(key.into(), value.into());
        self
    }

    /// Renders the currently allocated counters in exposition format.
    ///
    /// # Errors
    ///
    /// Propagates label decode failures from the registry enumeration and
    /// metric registration or encoding failures from the `prometheus`
    /// crate.
    pub fn render(&self, reader: &CountersReader<'_>) -> Result<String> {
        let mut rows = Vec::new();
        reader.for_each_metadata(|id, type_id, _key, label| {
            rows.push((id, type_id, label.to_owned(), reader.counter_value(id)));
        })?;

        let registry = Registry::new();
        for (id, type_id, label, value) in rows {
            // The prometheus crate rejects empty help strings.
            let help = if label.is_empty() {
                format!("counter {id}")
            } else {
                label.clone()
            };
            let mut opts = Opts::new(sanitize_metric_name(&label), help)
                .const_label("counter_id", id.to_string())
                .const_label("type_id", type_id.to_string());
            if let Some(ref namespace) = self.namespace {
                opts = opts.namespace(namespace.clone());
            }
            for (key, val) in &self.const_labels {
                opts = opts.const_label(key.clone(), val.clone());
            }

            let gauge = IntGauge::with_opts(opts).map_err(PrometheusError::from)?;
            gauge.set(value);
            registry.register(Box::new(gauge)).map_err(PrometheusError::from)?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(PrometheusError::from)?;

        Ok(String::from_utf8(buffer).map_err(PrometheusError::from)?)
    }
}

/// Maps a counter label to a valid Prometheus metric name.
///
/// Prometheus names match `[a-zA-Z_:][a-zA-Z0-9_:]*`; everything else
/// becomes an underscore.
fn sanitize_metric_name(label: &str) -> String {
    let mut name: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }

    name
}
