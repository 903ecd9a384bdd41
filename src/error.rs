//! Error types for CSV to `jsonobj` conversion

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Column '{0}' not found in header")]
    UnknownColumn(String),

    #[error("Line {line}: expected at least {expected} columns, found {found}")]
    ShortRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Line {line}: quoted field runs past the end of the line")]
    UnterminatedQuote { line: u64 },

    #[error("Line {line}: {field} is not a finite number: {value:?}")]
    InvalidNumber {
        line: u64,
        field: &'static str,
        value: String,
    },
}
