//! Error types for fundsflow storage.

use fundsflow_core::LedgerError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// A unique index rejected the write.
    #[error("unique violation on key {key}")]
    UniqueViolation {
        /// The conflicting key.
        key: String,
    },

    /// A row lock could not be acquired within the lock timeout.
    #[error("lock wait timed out on {row}")]
    LockTimeout {
        /// Description of the contended row.
        row: String,
    },
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { key } => Self::DuplicateIdempotencyKey { key },
            StoreError::LockTimeout { row } => Self::ContentionTimeout(row),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_into_ledger_errors() {
        let dup: LedgerError = StoreError::UniqueViolation { key: "k1".into() }.into();
        assert!(matches!(dup, LedgerError::DuplicateIdempotencyKey { ref key } if key == "k1"));

        let timeout: LedgerError = StoreError::LockTimeout { row: "account".into() }.into();
        assert!(matches!(timeout, LedgerError::ContentionTimeout(_)));
        assert!(timeout.is_retryable());

        let db: LedgerError = StoreError::Database("disk full".into()).into();
        assert!(matches!(db, LedgerError::Persistence(ref m) if m.contains("disk full")));
    }
}
