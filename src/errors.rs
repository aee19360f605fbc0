use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::DatasetName;

/// Error type for configuration, parsing, and persistence failures.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Invalid request or unresolvable setting; raised before any write.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A required raw file is absent.
    #[error("dataset '{dataset}' is missing required input {}", path.display())]
    MissingInput {
        /// Dataset being loaded.
        dataset: DatasetName,
        /// Expected location.
        path: PathBuf,
    },
    /// A raw file has an unusable shape (missing required columns, no id).
    #[error("dataset '{dataset}' could not parse {}: {details}", path.display())]
    Parse {
        /// Dataset being loaded.
        dataset: DatasetName,
        /// Offending file.
        path: PathBuf,
        /// What was wrong.
        details: String,
    },
    /// Empty or missing natural key.
    #[error("cannot derive identifier: {0}")]
    Identifier(String),
    /// SQLite failure; the dataset's transaction is rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Delimited reader failure outside a single record.
    #[error("delimited read failure: {0}")]
    Csv(#[from] csv::Error),
    /// Attribute encoding failure.
    #[error("json encoding failure: {0}")]
    Json(#[from] serde_json::Error),
    /// Parquet reader failure.
    #[cfg(feature = "parquet")]
    #[error("parquet read failure: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl LoadError {
    /// True for errors raised before any transaction could be opened.
    pub fn is_configuration(&self) -> bool {
        matches!(self, LoadError::Configuration(_))
    }
}
