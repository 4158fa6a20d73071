//! Error types for opcal

use thiserror::Error;

/// opcal error type
#[derive(Error, Debug)]
pub enum Error {
    /// A required per-event collection is absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// Contract violation between accumulation and querying phases.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Requested target lies outside the recorded curve domain.
    #[error("target {target} outside recorded range [{lo}, {hi}]")]
    OutOfRange {
        /// Requested target value.
        target: f64,
        /// Lower edge of the recorded domain.
        lo: f64,
        /// Upper edge of the recorded domain.
        hi: f64,
    },

    /// Configuration validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Whether the condition is local to one event or working point.
    ///
    /// Only `IllegalState` (and startup configuration/I/O failures) terminate a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MissingInput(_) | Error::OutOfRange { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_taxonomy() {
        assert!(Error::MissingInput("jets".into()).is_recoverable());
        assert!(Error::OutOfRange { target: 0.9, lo: 0.0, hi: 0.75 }.is_recoverable());
        assert!(!Error::IllegalState("add after finalize".into()).is_recoverable());
        assert!(!Error::Config("no taggers".into()).is_recoverable());
    }

    #[test]
    fn test_out_of_range_message() {
        let e = Error::OutOfRange { target: 0.9, lo: 0.0, hi: 0.75 };
        assert_eq!(e.to_string(), "target 0.9 outside recorded range [0, 0.75]");
    }
}
