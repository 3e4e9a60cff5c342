//! `RocksDB` storage implementation.
//!
//! Built on a pessimistic `TransactionDB`: every unit of work is a `RocksDB` transaction,
//! rows are locked with `get_for_update`, and lock waits are bounded by the configured
//! lock timeout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    Options, Transaction, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};

use fundsflow_core::{
    Account, AccountId, LedgerEntry, TransactionId, TransactionLog, TransactionLogId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{Store, UnitOfWork, DEFAULT_LOCK_TIMEOUT};

type Db = TransactionDB<MultiThreaded>;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
    lock_timeout: Duration,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Open or create a database whose row lock waits give up after `lock_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with_lock_timeout<P: AsRef<Path>>(path: P, lock_timeout: Duration) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(millis(lock_timeout));

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, &txn_db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(path = %path.as_ref().display(), "opened RocksDB transaction store");

        Ok(Self {
            db: Arc::new(db),
            lock_timeout,
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Collect every value in `cf_name` whose key starts with `prefix`.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }

    fn get<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| deserialize(&data))
            .transpose()
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Serialize a value using CBOR.
fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Deserialize a value from CBOR.
fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Map a `RocksDB` error raised while touching `row`.
fn row_error(row: String) -> impl FnOnce(rocksdb::Error) -> StoreError {
    move |e| match e.kind() {
        ErrorKind::TimedOut | ErrorKind::Busy => StoreError::LockTimeout { row },
        _ => StoreError::Database(e.to_string()),
    }
}

impl Store for RocksStore {
    fn begin(&self) -> Result<Box<dyn UnitOfWork + '_>> {
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_lock_timeout(millis(self.lock_timeout));
        let txn = self.db.transaction_opt(&WriteOptions::default(), &txn_opts);
        Ok(Box::new(RocksUnit { store: self, txn }))
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.id);
        let value = serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get(cf::ACCOUNTS, &keys::account_key(account_id))
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        self.scan_prefix(cf::ACCOUNTS, &[])?
            .iter()
            .map(|(_, value)| deserialize(value))
            .collect()
    }

    // =========================================================================
    // Transaction Log Operations
    // =========================================================================

    fn get_transaction_log(&self, log_id: &TransactionLogId) -> Result<Option<TransactionLog>> {
        self.get(cf::TRANSACTION_LOGS, &keys::transaction_log_key(log_id))
    }

    fn find_transaction_log_by_key(&self, idempotency_key: &str) -> Result<Option<TransactionLog>> {
        let cf = self.cf(cf::IDEMPOTENCY_KEYS)?;
        let Some(log_key) = self
            .db
            .get_cf(&cf, keys::idempotency_key(idempotency_key))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };
        self.get(cf::TRANSACTION_LOGS, &log_key)
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn list_ledger_entries(&self, transaction_id: &TransactionId) -> Result<Vec<LedgerEntry>> {
        self.scan_prefix(
            cf::LEDGER_ENTRIES,
            &keys::ledger_transaction_prefix(transaction_id),
        )?
        .iter()
        .map(|(_, value)| deserialize(value))
        .collect()
    }

    fn list_ledger_entries_by_reference(
        &self,
        reference_id: &uuid::Uuid,
    ) -> Result<Vec<LedgerEntry>> {
        let index = self.scan_prefix(
            cf::LEDGER_ENTRIES_BY_REFERENCE,
            &keys::reference_prefix(reference_id),
        )?;

        let mut entries = Vec::with_capacity(index.len());
        for (key, _) in index {
            let entry_key = keys::ledger_entry_key_from_reference_key(&key).ok_or_else(|| {
                StoreError::Database(format!("malformed reference index key ({} bytes)", key.len()))
            })?;
            if let Some(entry) = self.get(cf::LEDGER_ENTRIES, &entry_key)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

struct RocksUnit<'a> {
    store: &'a RocksStore,
    txn: Transaction<'a, Db>,
}

impl RocksUnit<'_> {
    fn get_for_update<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
        row: String,
    ) -> Result<Option<T>> {
        let cf = self.store.cf(cf_name)?;
        self.txn
            .get_for_update_cf(&cf, key, true)
            .map_err(row_error(row))?
            .map(|data| deserialize(&data))
            .transpose()
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8], row: String) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        self.txn.put_cf(&cf, key, value).map_err(row_error(row))
    }
}

impl UnitOfWork for RocksUnit<'_> {
    fn lock_account(&mut self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get_for_update(
            cf::ACCOUNTS,
            &keys::account_key(account_id),
            format!("account {account_id}"),
        )
    }

    fn lock_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<Option<LedgerEntry>> {
        self.get_for_update(
            cf::LEDGER_ENTRIES,
            &keys::ledger_entry_key(&entry.transaction_id, &entry.id),
            format!("ledger entry {}", entry.id),
        )
    }

    fn insert_transaction_log(&mut self, log: &TransactionLog) -> Result<()> {
        let row = format!("idempotency key {}", log.idempotency_key);
        let index_key = keys::idempotency_key(&log.idempotency_key);
        let cf = self.store.cf(cf::IDEMPOTENCY_KEYS)?;

        let taken = self
            .txn
            .get_for_update_cf(&cf, &index_key, true)
            .map_err(row_error(row.clone()))?
            .is_some();
        if taken {
            return Err(StoreError::UniqueViolation {
                key: log.idempotency_key.clone(),
            });
        }

        let log_key = keys::transaction_log_key(&log.id);
        self.put(cf::IDEMPOTENCY_KEYS, &index_key, &log_key, row.clone())?;
        self.put(cf::TRANSACTION_LOGS, &log_key, &serialize(log)?, row)
    }

    fn update_transaction_log(&mut self, log: &TransactionLog) -> Result<()> {
        let row = format!("transaction log {}", log.id);
        let key = keys::transaction_log_key(&log.id);
        let existing: Option<TransactionLog> =
            self.get_for_update(cf::TRANSACTION_LOGS, &key, row.clone())?;
        if existing.is_none() {
            return Err(StoreError::NotFound);
        }
        self.put(cf::TRANSACTION_LOGS, &key, &serialize(log)?, row)
    }

    fn insert_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        let row = format!("ledger entry {}", entry.id);
        self.put(
            cf::LEDGER_ENTRIES,
            &keys::ledger_entry_key(&entry.transaction_id, &entry.id),
            &serialize(entry)?,
            row.clone(),
        )?;
        self.put(
            cf::LEDGER_ENTRIES_BY_REFERENCE,
            &keys::reference_index_key(&entry.reference_id, &entry.transaction_id, &entry.id),
            &[],
            row,
        )
    }

    fn update_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<()> {
        let existing = self.lock_ledger_entry(entry)?;
        if existing.is_none() {
            return Err(StoreError::NotFound);
        }
        self.put(
            cf::LEDGER_ENTRIES,
            &keys::ledger_entry_key(&entry.transaction_id, &entry.id),
            &serialize(entry)?,
            format!("ledger entry {}", entry.id),
        )
    }

    fn update_account(&mut self, account: &Account) -> Result<()> {
        self.put(
            cf::ACCOUNTS,
            &keys::account_key(&account.id),
            &serialize(account)?,
            format!("account {}", account.id),
        )
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.txn
            .commit()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn rollback(self: Box<Self>) -> Result<()> {
        self.txn
            .rollback()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
