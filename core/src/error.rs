//! Error types for fundsflow.

use crate::ids::{AccountId, IdError, LedgerEntryId, TransactionId};
use crate::ledger::EntryStatus;

/// Result type for fundsflow operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors returned by transfers, reversals and interest accrual.
///
/// Every variant means the data model was left unchanged by the failed operation.
/// Replaying a known idempotency key is a success, never one of these.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Request failed validation (non-positive amount, same-account transfer, bad key).
    #[error("validation error: {0}")]
    Validation(String),

    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account that was not found.
        account_id: AccountId,
    },

    /// The paying account cannot cover the amount.
    #[error("insufficient funds in {account_id}: balance={balance}, required={required}")]
    InsufficientFunds {
        /// The paying account.
        account_id: AccountId,
        /// Balance at the time of the check, in minor units.
        balance: i64,
        /// Amount requested, in minor units.
        required: i64,
    },

    /// Another request with the same idempotency key won the race and its log could not
    /// be read back.
    #[error("duplicate idempotency key: {key}")]
    DuplicateIdempotencyKey {
        /// The contested key.
        key: String,
    },

    /// A row lock was not granted within the configured wait. Safe to retry.
    #[error("lock contention timeout: {0}")]
    ContentionTimeout(String),

    /// The underlying store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Transfer log not found.
    #[error("transfer not found: {id}")]
    TransferNotFound {
        /// The log id or idempotency key that was looked up.
        id: String,
    },

    /// The legs of a ledger transaction do not sum to zero.
    #[error("unbalanced ledger transaction {transaction_id}: credits - debits = {net}")]
    UnbalancedTransaction {
        /// The offending transaction.
        transaction_id: TransactionId,
        /// Credits minus debits.
        net: i128,
    },

    /// A ledger entry status change outside PENDING→POSTED or POSTED→REVERSED.
    #[error("invalid status transition for entry {entry_id}: {from:?} -> {to:?}")]
    InvalidStatusTransition {
        /// The entry being transitioned.
        entry_id: LedgerEntryId,
        /// Current status.
        from: EntryStatus,
        /// Requested status.
        to: EntryStatus,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Stable machine-readable code for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidId(_) => "validation_error",
            Self::AccountNotFound { .. } => "account_not_found",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::DuplicateIdempotencyKey { .. } => "duplicate_idempotency_key",
            Self::ContentionTimeout(_) => "contention_timeout",
            Self::Persistence(_) => "persistence_error",
            Self::TransferNotFound { .. } => "transfer_not_found",
            Self::UnbalancedTransaction { .. } => "unbalanced_transaction",
            Self::InvalidStatusTransition { .. } => "invalid_status_transition",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ContentionTimeout(_) | Self::DuplicateIdempotencyKey { .. }
        )
    }
}
