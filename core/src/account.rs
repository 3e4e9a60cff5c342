//! Account types for fundsflow.
//!
//! An account holds a single signed balance in minor units (cents, kobo, sats).
//! User balances never go negative through a transfer; system accounts such as the
//! interest-expense account may.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::AccountId;

/// Default clearing account used as the intermediate hop of every transfer.
pub const DEFAULT_CLEARING_ACCOUNT_ID: &str = "95369b3b-1298-4994-9f53-8c51a6c43199";

/// Default interest-expense account debited for every accrual.
pub const DEFAULT_INTEREST_EXPENSE_ACCOUNT_ID: &str = "7d0c2f6e-3b1a-4c57-9e0f-1a2b3c4d5e6f";

/// Who owns an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// A customer account. Accrues interest.
    User,
    /// A system-owned account (clearing, interest expense). Never accrues interest.
    System,
}

/// A balance-holding account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,

    /// Display name.
    pub name: Option<String>,

    /// Current balance in minor units.
    pub balance: i64,

    /// User or system account.
    pub kind: AccountKind,

    /// Last calendar day (UTC) interest was applied.
    pub last_accrued_on: Option<NaiveDate>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a user account with an opening balance.
    #[must_use]
    pub fn new(id: AccountId, name: Option<String>, balance: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            balance,
            kind: AccountKind::User,
            last_accrued_on: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a zero-balance system account.
    #[must_use]
    pub fn system(id: AccountId, name: &str) -> Self {
        Self {
            kind: AccountKind::System,
            ..Self::new(id, Some(name.to_string()), 0)
        }
    }

    /// Whether the account can pay `amount` out of its balance.
    #[must_use]
    pub fn can_cover(&self, amount: i64) -> bool {
        self.balance >= amount
    }

    /// Whether this is a system-owned account.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.kind == AccountKind::System
    }

    /// Decrease the balance, refusing to go below zero.
    ///
    /// # Errors
    ///
    /// `InsufficientFunds` if the balance is lower than `amount`.
    pub fn debit(&mut self, amount: i64) -> Result<()> {
        if !self.can_cover(amount) {
            return Err(LedgerError::InsufficientFunds {
                account_id: self.id,
                balance: self.balance,
                required: amount,
            });
        }
        self.apply_delta(-amount)
    }

    /// Increase the balance.
    ///
    /// # Errors
    ///
    /// `Validation` on overflow.
    pub fn credit(&mut self, amount: i64) -> Result<()> {
        self.apply_delta(amount)
    }

    /// Add a signed delta with no floor. Used for system accounts.
    ///
    /// # Errors
    ///
    /// `Validation` on overflow.
    pub fn apply_delta(&mut self, delta: i64) -> Result<()> {
        self.balance = self.balance.checked_add(delta).ok_or_else(|| {
            LedgerError::Validation(format!("balance overflow on account {}", self.id))
        })?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// System accounts the ledger routes through. Configured, never hardcoded in logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemAccounts {
    /// Intermediate hop for transfers.
    pub clearing: AccountId,
    /// Debited for every interest credit.
    pub interest_expense: AccountId,
}

impl SystemAccounts {
    /// Whether `id` is one of the system accounts.
    #[must_use]
    pub fn contains(&self, id: &AccountId) -> bool {
        *id == self.clearing || *id == self.interest_expense
    }
}

impl Default for SystemAccounts {
    fn default() -> Self {
        Self {
            clearing: DEFAULT_CLEARING_ACCOUNT_ID
                .parse()
                .unwrap_or_else(|_| AccountId::from_uuid(uuid::Uuid::nil())),
            interest_expense: DEFAULT_INTEREST_EXPENSE_ACCOUNT_ID
                .parse()
                .unwrap_or_else(|_| AccountId::from_uuid(uuid::Uuid::from_u128(u128::MAX))),
        }
    }
}
