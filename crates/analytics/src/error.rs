//! Analytics error types

use thiserror::Error;

/// Analytics errors
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// An operand failed identifier validation before any SQL was emitted
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// Invalid analysis window
    #[error("invalid analysis window: {0}")]
    InvalidWindow(String),

    /// A metric parameter is out of range
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Unknown metric name
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    /// A result was missing an expected column
    #[error("missing column in result: {0}")]
    MissingColumn(String),

    /// Backend error (from taxi-query)
    #[error("backend error: {0}")]
    Backend(#[from] taxi_query::QueryError),
}

impl AnalyticsError {
    /// Create an InvalidParameter error
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;
