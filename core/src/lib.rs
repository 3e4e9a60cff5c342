//! Core types and rules for fundsflow.
//!
//! This crate holds everything about money movement that does not touch storage:
//!
//! - **Identifiers**: `AccountId`, `LedgerEntryId`, `TransactionLogId`, `TransactionId`
//! - **Accounts**: `Account`, `AccountKind`, `SystemAccounts`
//! - **Ledger**: `LedgerEntry`, `EntryType`, `EntryStatus`, `ReferenceType`, invariant checks
//! - **Transfers**: `TransactionLog`, `TransferStatus`
//! - **Interest**: `InterestPolicy`
//!
//! # Amounts
//!
//! All amounts are `i64` minor units (cents, kobo, sats). Rates are `rust_decimal::Decimal`.
//! Floating point never touches money.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod ids;
pub mod interest;
pub mod ledger;
pub mod transaction_log;

pub use account::{
    Account, AccountKind, SystemAccounts, DEFAULT_CLEARING_ACCOUNT_ID,
    DEFAULT_INTEREST_EXPENSE_ACCOUNT_ID,
};
pub use error::{LedgerError, Result};
pub use ids::{AccountId, IdError, LedgerEntryId, TransactionId, TransactionLogId};
pub use interest::{InterestPolicy, DEFAULT_ANNUAL_RATE, DEFAULT_DAYS_IN_YEAR};
pub use ledger::{EntryStatus, EntryType, LedgerEntry, ReferenceType};
pub use transaction_log::{TransactionLog, TransferStatus, MAX_IDEMPOTENCY_KEY_LEN};
