//! Error types for radar processing.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using RadarError.
pub type RadarResult<T> = Result<T, RadarError>;

/// Primary error type for radar processing.
///
/// "No data for the requested time" is not an error: accessors return
/// `Ok(None)` for it. Cells outside the source coverage are not errors
/// either; they are tagged `Cell::Unmapped`.
#[derive(Debug, Error)]
pub enum RadarError {
    // === Caller errors, raised before any I/O ===
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported quantity: {0}")]
    UnsupportedQuantity(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid path template '{template}': {message}")]
    Template { template: String, message: String },

    // === Data errors ===
    #[error("Missing file for {time} required by accumulation: {}", path.display())]
    MissingIntermediateFile { time: DateTime<Utc>, path: PathBuf },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("Motion estimation failed: {0}")]
    Motion(String),

    // === Infrastructure ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RadarError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a Read error for a file.
    pub fn read(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Read {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(expected: (usize, usize), actual: (usize, usize)) -> Self {
        Self::ShapeMismatch { expected, actual }
    }

    /// True for errors caused by the caller's arguments rather than the data.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RadarError::InvalidConfiguration(_)
                | RadarError::UnsupportedQuantity(_)
                | RadarError::UnsupportedFormat(_)
                | RadarError::Template { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_missing_intermediate_file_message() {
        let err = RadarError::MissingIntermediateFile {
            time: Utc.with_ymd_and_hms(2024, 7, 1, 15, 40, 0).unwrap(),
            path: PathBuf::from("/data/qcomp_202407011540.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-07-01 15:40:00"));
        assert!(msg.contains("qcomp_202407011540.json"));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_caller_errors() {
        assert!(RadarError::invalid_config("radius missing").is_caller_error());
        assert!(RadarError::UnsupportedFormat(".grb2".into()).is_caller_error());
        assert!(!RadarError::shape_mismatch((2, 2), (3, 3)).is_caller_error());
    }
}
