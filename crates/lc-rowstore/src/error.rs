//! Codec errors.

use thiserror::Error;

/// Errors from encoding or decoding an artifact.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("null value in column '{column}' at row {row}")]
    NullValue { column: String, row: usize },

    #[error("timestamp out of range in column '{column}': {value}")]
    TimestampOutOfRange { column: String, value: String },

    #[error("entry of type {found} cannot be written to a {expected} artifact")]
    MixedLogTypes {
        expected: &'static str,
        found: &'static str,
    },
}

impl From<CodecError> for lc_common::Error {
    fn from(err: CodecError) -> Self {
        lc_common::Error::Codec {
            key: String::new(),
            reason: err.to_string(),
        }
    }
}
