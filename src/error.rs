// ❗ Engine Errors - one typed error for every expected failure
// Malformed input is reported through these variants, never through panics.

use thiserror::Error;

use crate::model::StatementFormat;

/// The errors the ingestion pipeline can return.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatementError {
    /// The file is neither OFX/QFX-shaped nor tabular.
    #[error("unsupported format for '{file_name}': {reason}")]
    UnsupportedFormat { file_name: String, reason: String },

    /// The format was recognised but no transaction could be extracted.
    #[error("malformed {format} content: {message}")]
    MalformedContent {
        format: StatementFormat,
        message: String,
    },

    /// A categorization rule could not be created.
    #[error("invalid categorization rule '{rule}': {message}")]
    InvalidRule { rule: String, message: String },

    /// A transaction breaks the model invariants (e.g. direction vs sign).
    #[error("invalid transaction {fit_id}: {message}")]
    InvalidTransaction { fit_id: String, message: String },

    /// The caller supplied options that cannot be honoured.
    #[error("invalid parse options: {0}")]
    InvalidOptions(String),
}

impl StatementError {
    pub fn malformed(format: StatementFormat, message: impl Into<String>) -> Self {
        StatementError::MalformedContent {
            format,
            message: message.into(),
        }
    }

    pub fn unsupported(file_name: &str, reason: impl Into<String>) -> Self {
        StatementError::UnsupportedFormat {
            file_name: file_name.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatementError>;
