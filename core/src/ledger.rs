//! Double-entry ledger entries and the invariant checker.
//!
//! Every money movement is recorded as a set of entries sharing one [`TransactionId`].
//! For each transaction the credits minus the debits must equal zero. Posted entries are
//! immutable apart from the POSTED→REVERSED transition, which is always paired with a
//! compensating entry of the opposite type and equal amount.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::{AccountId, LedgerEntryId, TransactionId};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Money leaves the account.
    Debit,
    /// Money enters the account.
    Credit,
}

impl EntryType {
    /// The opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }
}

/// Lifecycle of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Recorded but not yet effective.
    Pending,
    /// Effective.
    Posted,
    /// Cancelled by a compensating entry.
    Reversed,
}

impl EntryStatus {
    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Posted) | (Self::Posted, Self::Reversed)
        )
    }
}

/// What produced a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    /// A funds transfer; the reference is the transaction log.
    Transfer,
    /// An interest accrual; the reference is the accrual run.
    Interest,
    /// A transfer reversal; the reference is the reversal's transaction log.
    Reversal,
}

/// One signed money movement on one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry identifier.
    pub id: LedgerEntryId,
    /// Ledger transaction this entry belongs to.
    pub transaction_id: TransactionId,
    /// Account moved.
    pub account_id: AccountId,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Non-negative amount in minor units.
    pub amount: i64,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// What produced the entry.
    pub reference_type: ReferenceType,
    /// Id of the producing record (transaction log or accrual run).
    pub reference_id: uuid::Uuid,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry status last changed.
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a POSTED entry.
    #[must_use]
    pub fn posted(
        transaction_id: TransactionId,
        account_id: AccountId,
        entry_type: EntryType,
        amount: i64,
        reference_type: ReferenceType,
        reference_id: uuid::Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: LedgerEntryId::generate(),
            transaction_id,
            account_id,
            entry_type,
            amount,
            status: EntryStatus::Posted,
            reference_type,
            reference_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Amount signed from the ledger's point of view: credits positive, debits negative.
    #[must_use]
    pub fn signed_amount(&self) -> i128 {
        match self.entry_type {
            EntryType::Credit => i128::from(self.amount),
            EntryType::Debit => -i128::from(self.amount),
        }
    }

    /// Move this entry to `next`.
    ///
    /// # Errors
    ///
    /// `InvalidStatusTransition` unless PENDING→POSTED or POSTED→REVERSED.
    pub fn transition(&mut self, next: EntryStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidStatusTransition {
                entry_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Build the compensating entry for this one: same account and amount, opposite type.
    #[must_use]
    pub fn compensating(&self, transaction_id: TransactionId, reference_id: uuid::Uuid) -> Self {
        Self::posted(
            transaction_id,
            self.account_id,
            self.entry_type.opposite(),
            self.amount,
            ReferenceType::Reversal,
            reference_id,
        )
    }
}

/// Build the four legs of a transfer routed through the clearing account:
/// DEBIT `from`, CREDIT clearing, DEBIT clearing, CREDIT `to`.
#[must_use]
pub fn transfer_legs(
    transaction_id: TransactionId,
    from: AccountId,
    clearing: AccountId,
    to: AccountId,
    amount: i64,
    reference_id: uuid::Uuid,
) -> Vec<LedgerEntry> {
    let leg = |account_id, entry_type| {
        LedgerEntry::posted(
            transaction_id,
            account_id,
            entry_type,
            amount,
            ReferenceType::Transfer,
            reference_id,
        )
    };
    vec![
        leg(from, EntryType::Debit),
        leg(clearing, EntryType::Credit),
        leg(clearing, EntryType::Debit),
        leg(to, EntryType::Credit),
    ]
}

/// Build the two legs of an interest accrual: DEBIT interest expense, CREDIT the account.
#[must_use]
pub fn accrual_legs(
    transaction_id: TransactionId,
    interest_expense: AccountId,
    account: AccountId,
    interest: i64,
    run_id: uuid::Uuid,
) -> Vec<LedgerEntry> {
    vec![
        LedgerEntry::posted(
            transaction_id,
            interest_expense,
            EntryType::Debit,
            interest,
            ReferenceType::Interest,
            run_id,
        ),
        LedgerEntry::posted(
            transaction_id,
            account,
            EntryType::Credit,
            interest,
            ReferenceType::Interest,
            run_id,
        ),
    ]
}

/// Credits minus debits over `entries`.
#[must_use]
pub fn net_amount(entries: &[LedgerEntry]) -> i128 {
    entries.iter().map(LedgerEntry::signed_amount).sum()
}

/// Check the double-entry invariant for the entries of one ledger transaction.
///
/// # Errors
///
/// - `Validation` if `entries` is empty, mixes transaction ids, or holds a negative amount.
/// - `UnbalancedTransaction` if credits minus debits is not zero.
pub fn ensure_balanced(entries: &[LedgerEntry]) -> Result<()> {
    let first = entries
        .first()
        .ok_or_else(|| LedgerError::Validation("ledger transaction has no entries".into()))?;
    let transaction_id = first.transaction_id;

    if let Some(stray) = entries.iter().find(|e| e.transaction_id != transaction_id) {
        return Err(LedgerError::Validation(format!(
            "entry {} belongs to {} not {transaction_id}",
            stray.id, stray.transaction_id
        )));
    }
    if let Some(negative) = entries.iter().find(|e| e.amount < 0) {
        return Err(LedgerError::Validation(format!(
            "entry {} has negative amount {}",
            negative.id, negative.amount
        )));
    }

    match net_amount(entries) {
        0 => Ok(()),
        net => Err(LedgerError::UnbalancedTransaction {
            transaction_id,
            net,
        }),
    }
}

/// Check that `after` is a legal evolution of `before` for every entry present in both.
///
/// # Errors
///
/// `InvalidStatusTransition` for the first entry whose status changed illegally, or
/// `Validation` if amount, type or account changed.
pub fn ensure_valid_history(before: &[LedgerEntry], after: &[LedgerEntry]) -> Result<()> {
    for old in before {
        let Some(new) = after.iter().find(|e| e.id == old.id) else {
            return Err(LedgerError::Validation(format!(
                "entry {} disappeared from the ledger",
                old.id
            )));
        };
        if new.amount != old.amount
            || new.entry_type != old.entry_type
            || new.account_id != old.account_id
        {
            return Err(LedgerError::Validation(format!(
                "entry {} was modified after posting",
                old.id
            )));
        }
        if new.status != old.status && !old.status.can_transition_to(new.status) {
            return Err(LedgerError::InvalidStatusTransition {
                entry_id: old.id,
                from: old.status,
                to: new.status,
            });
        }
    }
    Ok(())
}
