//! Column families used by the `RocksDB` backend.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Transaction logs, keyed by `transaction_log_id`.
    pub const TRANSACTION_LOGS: &str = "transaction_logs";

    /// Unique index: idempotency key to `transaction_log_id`.
    pub const IDEMPOTENCY_KEYS: &str = "idempotency_keys";

    /// Ledger entries, keyed by `transaction_id || entry_id`.
    pub const LEDGER_ENTRIES: &str = "ledger_entries";

    /// Index: ledger entries by reference, keyed by
    /// `reference_id || transaction_id || entry_id`. Value is empty.
    pub const LEDGER_ENTRIES_BY_REFERENCE: &str = "ledger_entries_by_reference";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::TRANSACTION_LOGS,
        cf::IDEMPOTENCY_KEYS,
        cf::LEDGER_ENTRIES,
        cf::LEDGER_ENTRIES_BY_REFERENCE,
    ]
}
