//! Error types for the gazetteer store.

use crate::types::CityId;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GazetteerError>;

/// Errors returned by the store, its index and its loaders.
#[derive(Debug, Error)]
pub enum GazetteerError {
    /// Longitude or latitude is non-finite or outside the WGS84 range.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A descriptive field is empty or the record id is zero.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Duplicate id: {0}")]
    DuplicateId(CityId),

    #[error("Record not found: {0}")]
    NotFound(CityId),

    /// A record inside a bulk load was rejected; nothing from the batch was committed.
    #[error("Bulk load failed at record {index}: {cause}")]
    BulkLoadFailed {
        index: usize,
        cause: Box<GazetteerError>,
    },

    /// Malformed query arguments (radius, k, bounding box).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "toml")]
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl GazetteerError {
    /// Wrap `self` as the cause of a failed bulk load at `index`.
    pub fn at_bulk_index(self, index: usize) -> Self {
        GazetteerError::BulkLoadFailed {
            index,
            cause: Box::new(self),
        }
    }

    /// The underlying cause for bulk load failures, `self` otherwise.
    pub fn root_cause(&self) -> &GazetteerError {
        match self {
            GazetteerError::BulkLoadFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_failure_message_names_index() {
        let err = GazetteerError::DuplicateId(7).at_bulk_index(41);
        assert_eq!(
            err.to_string(),
            "Bulk load failed at record 41: Duplicate id: 7"
        );
        assert!(matches!(err.root_cause(), GazetteerError::DuplicateId(7)));
    }
}
