//! Error types for Pulse Integrity

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Empty sample set: metrics are undefined for zero samples")]
    EmptySampleSet,

    #[error("Non-finite sample at index {index}")]
    NonFiniteSample { index: usize },

    #[error("Metric {field} is not representable for this input")]
    MetricOverflow { field: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Session has no recorded samples")]
    EmptySession,
}
