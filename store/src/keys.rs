//! Key encoding for the `RocksDB` column families.

use fundsflow_core::{AccountId, LedgerEntryId, TransactionId, TransactionLogId};

/// Key of an account record.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Key of a transaction log record.
#[must_use]
pub fn transaction_log_key(log_id: &TransactionLogId) -> Vec<u8> {
    log_id.as_bytes().to_vec()
}

/// Key of an idempotency index entry.
#[must_use]
pub fn idempotency_key(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// Key of a ledger entry.
///
/// Format: `transaction_id (16 bytes) || entry_id (16 bytes)`
///
/// Entries of one transaction are contiguous, and transactions sort by ULID time.
#[must_use]
pub fn ledger_entry_key(transaction_id: &TransactionId, entry_id: &LedgerEntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&transaction_id.to_bytes());
    key.extend_from_slice(entry_id.as_bytes());
    key
}

/// Prefix covering every entry of one ledger transaction.
#[must_use]
pub fn ledger_transaction_prefix(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Key of a reference index entry.
///
/// Format: `reference_id (16 bytes) || transaction_id (16 bytes) || entry_id (16 bytes)`
#[must_use]
pub fn reference_index_key(
    reference_id: &uuid::Uuid,
    transaction_id: &TransactionId,
    entry_id: &LedgerEntryId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(48);
    key.extend_from_slice(reference_id.as_bytes());
    key.extend_from_slice(&ledger_entry_key(transaction_id, entry_id));
    key
}

/// Prefix covering every entry recorded under one reference.
#[must_use]
pub fn reference_prefix(reference_id: &uuid::Uuid) -> Vec<u8> {
    reference_id.as_bytes().to_vec()
}

/// Recover the ledger entry key from a reference index key.
///
/// Returns `None` if the key is not 48 bytes long.
#[must_use]
pub fn ledger_entry_key_from_reference_key(key: &[u8]) -> Option<Vec<u8>> {
    (key.len() == 48).then(|| key[16..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_entry_key_format() {
        let tx = TransactionId::generate();
        let entry = LedgerEntryId::generate();
        let key = ledger_entry_key(&tx, &entry);

        assert_eq!(key.len(), 32);
        assert!(key.starts_with(&ledger_transaction_prefix(&tx)));
        assert_eq!(&key[16..], entry.as_bytes());
    }

    #[test]
    fn reference_key_points_back_at_entry() {
        let reference = uuid::Uuid::new_v4();
        let tx = TransactionId::generate();
        let entry = LedgerEntryId::generate();
        let key = reference_index_key(&reference, &tx, &entry);

        assert_eq!(key.len(), 48);
        assert!(key.starts_with(&reference_prefix(&reference)));
        assert_eq!(
            ledger_entry_key_from_reference_key(&key),
            Some(ledger_entry_key(&tx, &entry))
        );
        assert_eq!(ledger_entry_key_from_reference_key(&key[..40]), None);
    }

    #[test]
    fn fixed_width_keys() {
        assert_eq!(account_key(&AccountId::generate()).len(), 16);
        assert_eq!(transaction_log_key(&TransactionLogId::generate()).len(), 16);
        assert_eq!(idempotency_key("transfer-1"), b"transfer-1".to_vec());
    }
}
