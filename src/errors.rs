use thiserror::Error;

/// Every failure the invoice manager can report.
///
/// Core operations return these typed errors; only the `app` layer turns
/// them into user-facing notices.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings file could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An invoice document was malformed or missing an expected element
    #[error("Failed to process {file}: {reason}")]
    Parse {
        /// Display name of the offending file
        file: String,
        /// Underlying cause
        reason: String,
    },

    /// Export was refused before any file was written
    #[error("Export refused: {reason}")]
    ExportRefused {
        /// Why nothing was exported
        reason: String,
    },

    /// Spreadsheet writer failure
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    /// An edit would give a record the natural key of another record
    #[error("Another invoice already uses the key {key}")]
    KeyConflict {
        /// Display form of the conflicting natural key
        key: String,
    },

    /// Total value is not a finite number
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected value
        amount: f64,
    },

    /// A shell command referenced a row that is not in the current listing
    #[error("Row {row} is not in the current listing")]
    RowNotFound {
        /// The 1-based row number that was requested
        row: usize,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
