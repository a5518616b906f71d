use thiserror::Error;

/// Errors surfaced by the ledger, the comparator, and the consolidator.
///
/// `InvalidData` and `DuplicateKey` are caller errors and must never be
/// retried automatically. `Storage` is the only class eligible for an
/// external retry/backoff wrapper.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl LedgerError {
    /// Map an insert failure to the taxonomy: a unique-constraint violation
    /// becomes `DuplicateKey`, anything else stays a storage error.
    pub(crate) fn from_insert(e: sqlx::Error, key: &str) -> Self {
        if e.as_database_error()
            .map_or(false, |db| db.is_unique_violation())
        {
            LedgerError::DuplicateKey(key.to_string())
        } else {
            LedgerError::Storage(e)
        }
    }

    /// Whether a retry wrapper may attempt this call again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage(_))
    }
}
