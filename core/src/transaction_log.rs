//! Transaction logs: one row per logical transfer request, keyed by idempotency key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::{AccountId, TransactionLogId};

/// Longest idempotency key accepted.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Status of a transfer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Attempt in progress inside an uncommitted unit.
    Pending,
    /// All entries and balance updates committed.
    Completed,
    /// Terminal failure. Never written by a rolled-back attempt.
    Failed,
}

/// The durable record of a transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLog {
    /// Log identifier, referenced by the ledger entries of the transfer.
    pub id: TransactionLogId,
    /// Caller-supplied key; unique across all logs.
    pub idempotency_key: String,
    /// Paying account.
    pub from_user_id: AccountId,
    /// Receiving account.
    pub to_user_id: AccountId,
    /// Amount in minor units.
    pub amount: i64,
    /// Request status.
    pub status: TransferStatus,
    /// Transfer this log reverses, if it is a reversal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverses: Option<TransactionLogId>,
    /// When the attempt started.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

impl TransactionLog {
    /// Start a new PENDING log.
    #[must_use]
    pub fn pending(
        idempotency_key: impl Into<String>,
        from_user_id: AccountId,
        to_user_id: AccountId,
        amount: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionLogId::generate(),
            idempotency_key: idempotency_key.into(),
            from_user_id,
            to_user_id,
            amount,
            status: TransferStatus::Pending,
            reverses: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a PENDING log that moves `original`'s amount back to its sender.
    #[must_use]
    pub fn reversing(original: &TransactionLog, idempotency_key: impl Into<String>) -> Self {
        Self {
            reverses: Some(original.id),
            ..Self::pending(
                idempotency_key,
                original.to_user_id,
                original.from_user_id,
                original.amount,
            )
        }
    }

    /// Mark the log COMPLETED.
    ///
    /// # Errors
    ///
    /// `Validation` unless the log is PENDING.
    pub fn complete(&mut self) -> Result<()> {
        if self.status != TransferStatus::Pending {
            return Err(LedgerError::Validation(format!(
                "transaction log {} is {:?}, expected Pending",
                self.id, self.status
            )));
        }
        self.status = TransferStatus::Completed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether the transfer committed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == TransferStatus::Completed
    }

    /// Whether this log undoes an earlier transfer.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }
}

/// Check an idempotency key supplied by a caller.
///
/// # Errors
///
/// `Validation` if the key is blank or longer than [`MAX_IDEMPOTENCY_KEY_LEN`] bytes.
pub fn validate_idempotency_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(LedgerError::Validation(
            "idempotency key must not be empty".into(),
        ));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(LedgerError::Validation(format!(
            "idempotency key longer than {MAX_IDEMPOTENCY_KEY_LEN} bytes"
        )));
    }
    Ok(())
}
