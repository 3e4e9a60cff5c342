//! Transactional storage layer for fundsflow.
//!
//! Every balance-changing operation runs inside a [`UnitOfWork`]: a transaction that
//! takes exclusive row locks, stages writes, and applies them all-or-nothing on commit.
//! Dropping a unit without committing rolls it back and releases its locks.
//!
//! # Backends
//!
//! - [`MemoryStore`]: in-process tables guarded by a row lock table. Used by tests and
//!   the default service build.
//! - `RocksStore` (feature `rocksdb-backend`): a `RocksDB` `TransactionDB` using
//!   pessimistic row locks with a lock timeout.
//!
//! # Locking
//!
//! Callers that lock more than one account must lock them in ascending [`AccountId`]
//! order. Both backends bound every lock wait, so an out-of-order caller times out with
//! [`StoreError::LockTimeout`] instead of hanging.
//!
//! # Example
//!
//! ```
//! use fundsflow_core::{Account, AccountId};
//! use fundsflow_store::{MemoryStore, Store};
//!
//! let store = MemoryStore::default();
//! let id = AccountId::generate();
//! store.put_account(&Account::new(id, None, 100)).unwrap();
//!
//! let mut unit = store.begin().unwrap();
//! let mut account = unit.lock_account(&id).unwrap().unwrap();
//! account.credit(50).unwrap();
//! unit.update_account(&account).unwrap();
//! unit.commit().unwrap();
//!
//! assert_eq!(store.get_account(&id).unwrap().unwrap().balance, 150);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use fundsflow_core::{Account, AccountId, LedgerEntry, TransactionId, TransactionLog, TransactionLogId};

/// Default bound on a single row lock wait.
pub const DEFAULT_LOCK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// The storage trait: committed reads plus a factory for units of work.
pub trait Store: Send + Sync {
    /// Start a new unit of work.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot start a transaction.
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>>;

    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or overwrite an account outside of any unit. Used for provisioning.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get the committed state of an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// List every account, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_accounts(&self) -> Result<Vec<Account>>;

    // =========================================================================
    // Transaction Log Operations
    // =========================================================================

    /// Get a transaction log by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction_log(&self, log_id: &TransactionLogId) -> Result<Option<TransactionLog>>;

    /// Get the committed transaction log holding `idempotency_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_transaction_log_by_key(&self, idempotency_key: &str) -> Result<Option<TransactionLog>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// List the entries of one ledger transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_ledger_entries(&self, transaction_id: &TransactionId) -> Result<Vec<LedgerEntry>>;

    /// List every entry recorded with `reference_id` (a transaction log or accrual run).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_ledger_entries_by_reference(&self, reference_id: &uuid::Uuid)
        -> Result<Vec<LedgerEntry>>;
}

/// An open storage transaction.
///
/// Locks are exclusive and held until commit or rollback. Locking a row the unit
/// already holds returns the unit's own view of it, including staged writes.
pub trait UnitOfWork {
    /// Lock an account row and read it.
    ///
    /// # Errors
    ///
    /// `StoreError::LockTimeout` if another unit holds the row past the lock timeout.
    fn lock_account(&mut self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Lock a ledger entry row and read its current state.
    ///
    /// # Errors
    ///
    /// `StoreError::LockTimeout` if another unit holds the row past the lock timeout.
    fn lock_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<Option<LedgerEntry>>;

    /// Insert a transaction log, claiming its idempotency key.
    ///
    /// Concurrent units inserting the same key serialize on the key; the loser sees
    /// the winner's committed row.
    ///
    /// # Errors
    ///
    /// `StoreError::UniqueViolation` if the key is already taken.
    fn insert_transaction_log(&mut self, log: &TransactionLog) -> Result<()>;

    /// Overwrite a transaction log inserted by this unit or already committed.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the log does not exist.
    fn update_transaction_log(&mut self, log: &TransactionLog) -> Result<()>;

    /// Insert a new ledger entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be staged.
    fn insert_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()>;

    /// Overwrite an existing ledger entry. The row is locked if not already held.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the entry does not exist.
    fn update_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()>;

    /// Overwrite an account. The row is locked if not already held.
    ///
    /// # Errors
    ///
    /// `StoreError::LockTimeout` if the row cannot be locked.
    fn update_account(&mut self, account: &Account) -> Result<()>;

    /// Apply every staged write atomically and release all locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is applied in that case.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discard every staged write and release all locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to roll back.
    fn rollback(self: Box<Self>) -> Result<()>;
}
