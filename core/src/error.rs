use thiserror::Error;

/// Errors surfaced by the ledger.
///
/// Absence is never an error for plain lookups (`Option` is returned instead);
/// `NotFound` is reserved for operations where the caller expected a row.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("no daily aggregate for {date}; ensure the day before applying deltas")]
    AggregateNotFound { date: String },

    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },
}

impl LedgerError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
