//! Unified error type for all observers.
//!
//! This module provides a unified [`ObserverError`] type that wraps errors
//! from all observer implementations. This allows client code to switch
//! between observers without changing error handling logic.

use thiserror::Error;

use crate::registry::LabelDecodeError;

/// Unified error type for all observer operations.
///
/// This enum wraps errors from all observer implementations, allowing
/// client code to use a single error type regardless of which observer
/// is being used.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// A stored label failed to decode while enumerating the registry.
    #[error("label error: {0}")]
    Label(#[from] LabelDecodeError),

    /// Error from the Prometheus observer.
    #[cfg(feature = "prometheus")]
    #[error("prometheus error: {0}")]
    Prometheus(#[from] PrometheusError),

    /// Error encoding to UTF-8.
    #[error("utf8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for observer operations.
pub type Result<T> = std::result::Result<T, ObserverError>;

/// Error type specific to Prometheus observer operations.
#[cfg(feature = "prometheus")]
#[derive(Debug, Error)]
pub enum PrometheusError {
    /// Error creating or registering a metric.
    #[error("metric error: {0}")]
    MetricError(String),

    /// Error encoding metrics to text format.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Error converting bytes to UTF-8 string.
    #[error(transparent)]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

#[cfg(feature = "prometheus")]
impl From<prometheus::Error> for PrometheusError {
    fn from(err: prometheus::Error) -> Self {
        PrometheusError::MetricError(err.to_string())
    }
}

#[cfg(feature = "prometheus")]
impl From<prometheus::Error> for ObserverError {
    fn from(err: prometheus::Error) -> Self {
        ObserverError::Prometheus(PrometheusError::from(err))
    }
}
