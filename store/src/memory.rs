//! In-memory storage implementation.
//!
//! Committed state lives in plain tables behind an `RwLock`. Each unit of work holds
//! exclusive row locks from a shared lock table and stages its writes privately; commit
//! applies the staged writes under a single write guard, so readers never observe a
//! partial transfer.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use fundsflow_core::{
    Account, AccountId, LedgerEntry, LedgerEntryId, TransactionId, TransactionLog,
    TransactionLogId,
};

use crate::error::{Result, StoreError};
use crate::{Store, UnitOfWork, DEFAULT_LOCK_TIMEOUT};

/// A lockable row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    Account(AccountId),
    Entry(LedgerEntryId),
    IdempotencyKey(String),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account {id}"),
            Self::Entry(id) => write!(f, "ledger entry {id}"),
            Self::IdempotencyKey(key) => write!(f, "idempotency key {key}"),
        }
    }
}

/// Exclusive row locks shared by every unit of a store.
#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<RowKey>>,
    released: Condvar,
}

impl LockTable {
    fn acquire(&self, row: &RowKey, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while held.contains(row) {
            if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(row) {
                return Err(StoreError::LockTimeout {
                    row: row.to_string(),
                });
            }
        }
        held.insert(row.clone());
        Ok(())
    }

    fn release(&self, rows: &HashSet<RowKey>) {
        if rows.is_empty() {
            return;
        }
        let mut held = self.held.lock();
        for row in rows {
            held.remove(row);
        }
        drop(held);
        self.released.notify_all();
    }
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    logs: HashMap<TransactionLogId, TransactionLog>,
    logs_by_key: HashMap<String, TransactionLogId>,
    /// Entries in posting order.
    entries: Vec<LedgerEntry>,
    entry_index: HashMap<LedgerEntryId, usize>,
}

impl Tables {
    fn entry(&self, id: &LedgerEntryId) -> Option<&LedgerEntry> {
        self.entry_index.get(id).map(|&i| &self.entries[i])
    }
}

/// In-memory store with row-level locking.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    locks: LockTable,
    lock_timeout: Duration,
}

impl MemoryStore {
    /// Create an empty store with the given lock wait bound.
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: LockTable::default(),
            lock_timeout,
        }
    }

    /// Number of committed ledger entries.
    #[must_use]
    pub fn ledger_entry_count(&self) -> usize {
        self.tables.read().entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl Store for MemoryStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>> {
        Ok(Box::new(MemoryUnit {
            store: self,
            held: HashSet::new(),
            staged: Staged::default(),
        }))
    }

    fn put_account(&self, account: &Account) -> Result<()> {
        self.tables
            .write()
            .accounts
            .insert(account.id, account.clone());
        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().accounts.get(account_id).cloned())
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<_> = self.tables.read().accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    fn get_transaction_log(&self, log_id: &TransactionLogId) -> Result<Option<TransactionLog>> {
        Ok(self.tables.read().logs.get(log_id).cloned())
    }

    fn find_transaction_log_by_key(&self, idempotency_key: &str) -> Result<Option<TransactionLog>> {
        let tables = self.tables.read();
        Ok(tables
            .logs_by_key
            .get(idempotency_key)
            .and_then(|id| tables.logs.get(id))
            .cloned())
    }

    fn list_ledger_entries(&self, transaction_id: &TransactionId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .tables
            .read()
            .entries
            .iter()
            .filter(|e| e.transaction_id == *transaction_id)
            .cloned()
            .collect())
    }

    fn list_ledger_entries_by_reference(
        &self,
        reference_id: &uuid::Uuid,
    ) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .tables
            .read()
            .entries
            .iter()
            .filter(|e| e.reference_id == *reference_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct Staged {
    accounts: HashMap<AccountId, Account>,
    logs: HashMap<TransactionLogId, TransactionLog>,
    new_keys: HashMap<String, TransactionLogId>,
    new_entries: Vec<LedgerEntry>,
    entry_updates: HashMap<LedgerEntryId, LedgerEntry>,
}

struct MemoryUnit<'a> {
    store: &'a MemoryStore,
    held: HashSet<RowKey>,
    staged: Staged,
}

impl MemoryUnit<'_> {
    fn lock(&mut self, row: RowKey) -> Result<()> {
        if self.held.contains(&row) {
            return Ok(());
        }
        self.store.locks.acquire(&row, self.store.lock_timeout)?;
        self.held.insert(row);
        Ok(())
    }

    fn current_entry(&self, id: &LedgerEntryId) -> Option<LedgerEntry> {
        if let Some(entry) = self.staged.entry_updates.get(id) {
            return Some(entry.clone());
        }
        if let Some(entry) = self.staged.new_entries.iter().find(|e| e.id == *id) {
            return Some(entry.clone());
        }
        self.store.tables.read().entry(id).cloned()
    }
}

impl UnitOfWork for MemoryUnit<'_> {
    fn lock_account(&mut self, account_id: &AccountId) -> Result<Option<Account>> {
        self.lock(RowKey::Account(*account_id))?;
        if let Some(account) = self.staged.accounts.get(account_id) {
            return Ok(Some(account.clone()));
        }
        Ok(self.store.tables.read().accounts.get(account_id).cloned())
    }

    fn lock_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<Option<LedgerEntry>> {
        self.lock(RowKey::Entry(entry.id))?;
        Ok(self.current_entry(&entry.id))
    }

    fn insert_transaction_log(&mut self, log: &TransactionLog) -> Result<()> {
        self.lock(RowKey::IdempotencyKey(log.idempotency_key.clone()))?;
        let taken = self.staged.new_keys.contains_key(&log.idempotency_key)
            || self
                .store
                .tables
                .read()
                .logs_by_key
                .contains_key(&log.idempotency_key);
        if taken {
            return Err(StoreError::UniqueViolation {
                key: log.idempotency_key.clone(),
            });
        }
        self.staged
            .new_keys
            .insert(log.idempotency_key.clone(), log.id);
        self.staged.logs.insert(log.id, log.clone());
        Ok(())
    }

    fn update_transaction_log(&mut self, log: &TransactionLog) -> Result<()> {
        let exists = self.staged.logs.contains_key(&log.id)
            || self.store.tables.read().logs.contains_key(&log.id);
        if !exists {
            return Err(StoreError::NotFound);
        }
        self.staged.logs.insert(log.id, log.clone());
        Ok(())
    }

    fn insert_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        self.staged.new_entries.push(entry.clone());
        Ok(())
    }

    fn update_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        if let Some(staged) = self.staged.new_entries.iter_mut().find(|e| e.id == entry.id) {
            *staged = entry.clone();
            return Ok(());
        }
        self.lock(RowKey::Entry(entry.id))?;
        if self.store.tables.read().entry(&entry.id).is_none() {
            return Err(StoreError::NotFound);
        }
        self.staged.entry_updates.insert(entry.id, entry.clone());
        Ok(())
    }

    fn update_account(&mut self, account: &Account) -> Result<()> {
        self.lock(RowKey::Account(account.id))?;
        self.staged.accounts.insert(account.id, account.clone());
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut tables = self.store.tables.write();

        if let Some(key) = staged
            .new_keys
            .keys()
            .find(|key| tables.logs_by_key.contains_key(*key))
        {
            return Err(StoreError::UniqueViolation { key: key.clone() });
        }

        tables.accounts.extend(staged.accounts);
        tables.logs_by_key.extend(staged.new_keys);
        tables.logs.extend(staged.logs);
        for (id, entry) in staged.entry_updates {
            let index = tables.entry_index.get(&id).copied();
            if let Some(i) = index {
                tables.entries[i] = entry;
            }
        }
        for entry in staged.new_entries {
            let i = tables.entries.len();
            tables.entry_index.insert(entry.id, i);
            tables.entries.push(entry);
        }
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl Drop for MemoryUnit<'_> {
    fn drop(&mut self) {
        self.store.locks.release(&self.held);
    }
}
