//! Error types for txtrace.
//!
//! This module defines the crate-wide error type. Per-request API failures are
//! not represented here; they are folded into the `error` column of a
//! [`LookupRecord`](crate::record::LookupRecord) by the retry layer.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for txtrace operations.
#[derive(Error, Debug)]
pub enum Error {
    // === CSV Errors ===
    /// Reading or writing a CSV file failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is not present in a CSV header.
    #[error("column '{column}' not found in {path}. Columns: {available:?}")]
    MissingColumn {
        /// The column that was requested.
        column: String,
        /// The file that was read.
        path: PathBuf,
        /// Columns that the file does have.
        available: Vec<String>,
    },

    /// An amount cell could not be parsed.
    #[error("invalid amount '{value}' at row {row}: {reason}")]
    InvalidAmount {
        /// The raw cell contents.
        value: String,
        /// 1-based data row (header excluded).
        row: usize,
        /// Why parsing failed.
        reason: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// A configuration file named explicitly does not exist.
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// The missing file.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// The requested API source is not one of the presets.
    #[error("api_source must be one of {valid:?}, got '{given}'")]
    UnknownApiSource {
        /// The value that was given.
        given: String,
        /// Accepted values.
        valid: Vec<&'static str>,
    },

    // === Cache Errors ===
    /// Failed to open or create the lookup cache.
    #[error("failed to open lookup cache at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A cache query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run cache schema migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === HTTP Errors ===
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    // === Dataset Checks ===
    /// The dataset total does not match the expected value.
    #[error("total amount {actual} BTC differs from expected {expected} BTC by more than {tolerance} BTC")]
    TotalMismatch {
        /// Sum found in the dataset.
        actual: String,
        /// Sum that was expected.
        expected: String,
        /// Allowed absolute difference.
        tolerance: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// The run was interrupted before finishing.
    #[error("interrupted after {completed} of {total} lookups")]
    Interrupted {
        /// Lookups completed and flushed.
        completed: usize,
        /// Lookups that were scheduled.
        total: usize,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for txtrace operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a missing column error.
    #[must_use]
    pub fn missing_column(
        column: impl Into<String>,
        path: impl Into<PathBuf>,
        available: Vec<String>,
    ) -> Self {
        Self::MissingColumn {
            column: column.into(),
            path: path.into(),
            available,
        }
    }

    /// Check if this error was caused by an interruption.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Check if this error is a failed dataset total check.
    #[must_use]
    pub fn is_total_mismatch(&self) -> bool {
        matches!(self, Self::TotalMismatch { .. })
    }
}
