//! Structured error types shared by the metrics engine, extractors, and
//! record export.
//!
//! Metrics and extraction errors propagate to the caller uncaught. The
//! one deliberate exception is the delisting heuristic, which is
//! fail-safe and never raises (see `extract`).

use thiserror::Error;

/// Crate-wide error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer than the minimum required observations for a metric.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Unsupported enumerated parameter value or unparseable field format.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Provider returned no history after exhausting fallback windows.
    #[error("no historical data found for '{symbol}' after fallback windows")]
    NoData { symbol: String },

    /// Provider info blob absent or implausibly small after fallback.
    #[error("no usable info found for '{symbol}'")]
    NoInfo { symbol: String },

    /// A retry-wrapped operation failed on every attempt.
    #[error("'{operation}' failed after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },

    #[error("network error: {0}")]
    Network(String),

    #[error("response format changed: {0}")]
    ResponseFormat(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_operation_on_exhaustion() {
        let err = Error::RetriesExhausted {
            operation: "history".into(),
            attempts: 5,
        };
        assert_eq!(err.to_string(), "'history' failed after 5 attempts");
    }

    #[test]
    fn display_names_the_symbol_on_no_data() {
        let err = Error::NoData {
            symbol: "EURUSD=X".into(),
        };
        assert!(err.to_string().contains("EURUSD=X"));
    }
}
