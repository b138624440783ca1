//! Error types for the GNAF loader

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, GnafError>;

/// Main error type for the GNAF loader
///
/// Every variant is fatal: the pipeline never retries or compensates, it
/// aborts the run and leaves the target database in whatever state the
/// failing phase reached.
#[derive(Error, Debug)]
pub enum GnafError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed record in {file}: {detail}")]
    MalformedRecord { file: String, detail: String },

    #[error("File does not map to a known table: {0}")]
    UnknownTable(String),

    #[error("Schema or data asset not found: {0}")]
    MissingAsset(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GnafError {
    /// Create a database error with context
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a malformed-record error for a source file
    pub fn malformed(file: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            file: file.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GnafError::UnknownTable("SOMETHING_psv.psv".to_string());
        assert_eq!(
            err.to_string(),
            "File does not map to a known table: SOMETHING_psv.psv"
        );

        let err = GnafError::malformed("NSW_ADDRESS_DETAIL_psv.psv", "extra data after last expected column");
        assert!(err.to_string().contains("NSW_ADDRESS_DETAIL_psv.psv"));
        assert!(err.to_string().contains("extra data"));
    }

    #[test]
    fn test_missing_asset_display() {
        let err = GnafError::MissingAsset(PathBuf::from("G-NAF/Extras/create_tables_ansi.sql"));
        assert!(err.to_string().starts_with("Schema or data asset not found"));
    }
}
