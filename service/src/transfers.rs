//! Transfer orchestration.
//!
//! A transfer is one unit of work: claim the idempotency key with a PENDING log, lock both
//! accounts in canonical order, post four balanced ledger legs through the clearing
//! account, move the balances, complete the log, commit. Any failure before commit drops
//! the unit, which discards the PENDING log along with everything else.
//!
//! The idempotency key is checked twice. A committed log found up front is returned as is.
//! A unique violation while inserting means a concurrent request won the key; its log is
//! re-read and returned instead.

use std::sync::Arc;

use fundsflow_core::ledger::{ensure_balanced, ensure_valid_history, transfer_legs};
use fundsflow_core::transaction_log::validate_idempotency_key;
use fundsflow_core::{
    Account, AccountId, EntryStatus, LedgerEntry, LedgerError, ReferenceType, Result,
    SystemAccounts, TransactionId, TransactionLog, TransactionLogId,
};
use fundsflow_store::Store;

use crate::locking::lock_pair;

/// Moves money between user accounts.
#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn Store>,
    system: SystemAccounts,
}

impl TransferService {
    /// Create a transfer service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, system: SystemAccounts) -> Self {
        Self { store, system }
    }

    /// Move `amount` from `from` to `to`, at most once per `idempotency_key`.
    ///
    /// Replaying a key returns the stored log unchanged, whatever the other arguments are.
    ///
    /// # Errors
    ///
    /// - `Validation` for a non-positive amount, a self-transfer, a system account or a bad key.
    /// - `AccountNotFound` / `InsufficientFunds` from the locked reads.
    /// - `ContentionTimeout` if an account lock could not be acquired in time.
    /// - `DuplicateIdempotencyKey` if a concurrent request claimed the key and then rolled back.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        idempotency_key: &str,
    ) -> Result<TransactionLog> {
        self.validate_transfer(from, to, amount, idempotency_key)?;

        if let Some(existing) = self.store.find_transaction_log_by_key(idempotency_key)? {
            tracing::info!(
                idempotency_key,
                log_id = %existing.id,
                "Replaying transfer for known idempotency key"
            );
            return Ok(existing);
        }

        match self.execute_transfer(from, to, amount, idempotency_key) {
            Err(LedgerError::DuplicateIdempotencyKey { key }) => self.replay_winner(key),
            other => other,
        }
    }

    /// Undo a completed transfer.
    ///
    /// The original TRANSFER entries move to REVERSED and a compensating entry is posted for
    /// each. The reversal gets its own log, idempotent on `idempotency_key`.
    ///
    /// # Errors
    ///
    /// - `TransferNotFound` if no log has id `log_id`.
    /// - `Validation` if the transfer is not COMPLETED or is itself a reversal.
    /// - `InvalidStatusTransition` if the transfer was already reversed.
    /// - `InsufficientFunds` if the original recipient no longer holds the amount.
    pub fn reverse_transfer(
        &self,
        log_id: TransactionLogId,
        idempotency_key: &str,
    ) -> Result<TransactionLog> {
        validate_idempotency_key(idempotency_key)?;

        if let Some(existing) = self.store.find_transaction_log_by_key(idempotency_key)? {
            tracing::info!(
                idempotency_key,
                log_id = %existing.id,
                "Replaying reversal for known idempotency key"
            );
            return Ok(existing);
        }

        let original = self
            .store
            .get_transaction_log(&log_id)?
            .ok_or_else(|| LedgerError::TransferNotFound {
                id: log_id.to_string(),
            })?;
        if !original.is_completed() {
            return Err(LedgerError::Validation(format!(
                "transfer {log_id} is {:?} and cannot be reversed",
                original.status
            )));
        }
        if let Some(reversed) = original.reverses {
            return Err(LedgerError::Validation(format!(
                "transaction {log_id} is itself a reversal of {reversed} and cannot be reversed"
            )));
        }

        match self.execute_reversal(&original, idempotency_key) {
            Err(LedgerError::DuplicateIdempotencyKey { key }) => self.replay_winner(key),
            other => other,
        }
    }

    /// Look up the log holding `idempotency_key`.
    ///
    /// # Errors
    ///
    /// `Persistence` if the store fails.
    pub fn find_by_idempotency_key(&self, idempotency_key: &str) -> Result<Option<TransactionLog>> {
        Ok(self.store.find_transaction_log_by_key(idempotency_key)?)
    }

    /// Committed state of an account.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the account does not exist.
    pub fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .get_account(&account_id)?
            .ok_or(LedgerError::AccountNotFound { account_id })
    }

    /// Entries of one ledger transaction.
    ///
    /// # Errors
    ///
    /// `Persistence` if the store fails.
    pub fn ledger_entries(&self, transaction_id: &TransactionId) -> Result<Vec<LedgerEntry>> {
        Ok(self.store.list_ledger_entries(transaction_id)?)
    }

    /// Entries referencing a transaction log or accrual run.
    ///
    /// # Errors
    ///
    /// `Persistence` if the store fails.
    pub fn ledger_entries_for_reference(&self, reference_id: &uuid::Uuid) -> Result<Vec<LedgerEntry>> {
        Ok(self.store.list_ledger_entries_by_reference(reference_id)?)
    }

    fn validate_transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        idempotency_key: &str,
    ) -> Result<()> {
        if amount <= 0 {
            return Err(LedgerError::Validation(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if from == to {
            return Err(LedgerError::Validation(
                "cannot transfer to the same account".into(),
            ));
        }
        if let Some(system) = [from, to].into_iter().find(|id| self.system.contains(id)) {
            return Err(LedgerError::Validation(format!(
                "system account {system} cannot take part in a transfer"
            )));
        }
        validate_idempotency_key(idempotency_key)
    }

    fn execute_transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
        idempotency_key: &str,
    ) -> Result<TransactionLog> {
        let mut unit = self.store.begin()?;

        let mut log = TransactionLog::pending(idempotency_key, from, to, amount);
        unit.insert_transaction_log(&log)?;

        let (mut payer, mut payee) = lock_pair(&mut *unit, from, to)?;
        if !payer.can_cover(amount) {
            tracing::warn!(
                account_id = %from,
                balance = payer.balance,
                required = amount,
                idempotency_key,
                "Transfer rejected: insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds {
                account_id: from,
                balance: payer.balance,
                required: amount,
            });
        }

        let transaction_id = TransactionId::generate();
        let legs = transfer_legs(
            transaction_id,
            from,
            self.system.clearing,
            to,
            amount,
            *log.id.as_uuid(),
        );
        ensure_balanced(&legs)?;
        for leg in &legs {
            unit.insert_ledger_entry(leg)?;
        }

        payer.debit(amount)?;
        payee.credit(amount)?;
        unit.update_account(&payer)?;
        unit.update_account(&payee)?;

        log.complete()?;
        unit.update_transaction_log(&log)?;
        unit.commit()?;

        tracing::info!(
            log_id = %log.id,
            %transaction_id,
            %from,
            %to,
            amount,
            idempotency_key,
            "Transfer committed"
        );
        Ok(log)
    }

    fn execute_reversal(
        &self,
        original: &TransactionLog,
        idempotency_key: &str,
    ) -> Result<TransactionLog> {
        let mut log = TransactionLog::reversing(original, idempotency_key);
        let amount = log.amount;
        // The original recipient pays the money back.
        let from = log.from_user_id;
        let to = log.to_user_id;

        let mut unit = self.store.begin()?;
        unit.insert_transaction_log(&log)?;

        let (mut payer, mut payee) = lock_pair(&mut *unit, from, to)?;

        let posted: Vec<_> = self
            .store
            .list_ledger_entries_by_reference(original.id.as_uuid())?
            .into_iter()
            .filter(|e| e.reference_type == ReferenceType::Transfer)
            .collect();
        if posted.is_empty() {
            return Err(LedgerError::Persistence(format!(
                "completed transfer {} has no ledger entries",
                original.id
            )));
        }

        let transaction_id = TransactionId::generate();
        let mut reversed = Vec::with_capacity(posted.len());
        for entry in &posted {
            let mut current = unit.lock_ledger_entry(entry)?.ok_or_else(|| {
                LedgerError::Persistence(format!("ledger entry {} disappeared", entry.id))
            })?;
            current.transition(EntryStatus::Reversed)?;
            reversed.push(current);
        }
        ensure_valid_history(&posted, &reversed)?;

        let compensating: Vec<_> = reversed
            .iter()
            .map(|entry| entry.compensating(transaction_id, *log.id.as_uuid()))
            .collect();
        ensure_balanced(&compensating)?;
        for entry in &reversed {
            unit.update_ledger_entry(entry)?;
        }

        if !payer.can_cover(amount) {
            tracing::warn!(
                account_id = %from,
                balance = payer.balance,
                required = amount,
                original_log_id = %original.id,
                "Reversal rejected: insufficient funds"
            );
            return Err(LedgerError::InsufficientFunds {
                account_id: from,
                balance: payer.balance,
                required: amount,
            });
        }

        for entry in &compensating {
            unit.insert_ledger_entry(entry)?;
        }
        payer.debit(amount)?;
        payee.credit(amount)?;
        unit.update_account(&payer)?;
        unit.update_account(&payee)?;

        log.complete()?;
        unit.update_transaction_log(&log)?;
        unit.commit()?;

        tracing::info!(
            log_id = %log.id,
            original_log_id = %original.id,
            %transaction_id,
            amount,
            idempotency_key,
            "Reversal committed"
        );
        Ok(log)
    }

    /// Return the log of the request that won `key`.
    fn replay_winner(&self, key: String) -> Result<TransactionLog> {
        match self.store.find_transaction_log_by_key(&key)? {
            Some(log) => {
                tracing::info!(
                    idempotency_key = %key,
                    log_id = %log.id,
                    "Concurrent request won idempotency key, returning its log"
                );
                Ok(log)
            }
            None => Err(LedgerError::DuplicateIdempotencyKey { key }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundsflow_core::ledger::net_amount;
    use fundsflow_core::{EntryType, TransferStatus};
    use fundsflow_store::MemoryStore;
    use std::sync::Barrier;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: TransferService,
        alice: AccountId,
        bob: AccountId,
    }

    fn fixture() -> Fixture {
        fixture_with_timeout(Duration::from_secs(5))
    }

    fn fixture_with_timeout(lock_timeout: Duration) -> Fixture {
        let store = Arc::new(MemoryStore::new(lock_timeout));
        let system = SystemAccounts::default();
        store
            .put_account(&Account::system(system.clearing, "clearing"))
            .unwrap();
        let alice = AccountId::generate();
        let bob = AccountId::generate();
        store
            .put_account(&Account::new(alice, Some("Alice".into()), 100_000))
            .unwrap();
        store
            .put_account(&Account::new(bob, Some("Bob".into()), 50_000))
            .unwrap();
        let service = TransferService::new(store.clone(), system);
        Fixture {
            store,
            service,
            alice,
            bob,
        }
    }

    impl Fixture {
        fn balance(&self, id: AccountId) -> i64 {
            self.store.get_account(&id).unwrap().unwrap().balance
        }

        fn entries_for(&self, log: &TransactionLog) -> Vec<LedgerEntry> {
            self.store
                .list_ledger_entries_by_reference(log.id.as_uuid())
                .unwrap()
        }
    }

    #[test]
    fn transfer_moves_balances_and_posts_four_legs() {
        let f = fixture();
        let log = f.service.transfer(f.alice, f.bob, 20_000, "k1").unwrap();

        assert_eq!(log.status, TransferStatus::Completed);
        assert_eq!(f.balance(f.alice), 80_000);
        assert_eq!(f.balance(f.bob), 70_000);

        let entries = f.entries_for(&log);
        assert_eq!(entries.len(), 4);
        assert_eq!(net_amount(&entries), 0);
        assert!(entries.iter().all(|e| e.status == EntryStatus::Posted));
        let clearing = SystemAccounts::default().clearing;
        assert_eq!(
            entries.iter().filter(|e| e.account_id == clearing).count(),
            2
        );
        // Clearing nets to zero and is never mutated.
        assert_eq!(f.balance(clearing), 0);
    }

    #[test]
    fn replay_returns_same_log_without_effects() {
        let f = fixture();
        let first = f.service.transfer(f.alice, f.bob, 20_000, "k1").unwrap();
        let second = f.service.transfer(f.alice, f.bob, 20_000, "k1").unwrap();

        assert_eq!(first, second);
        assert_eq!(f.balance(f.alice), 80_000);
        assert_eq!(f.balance(f.bob), 70_000);
        assert_eq!(f.entries_for(&first).len(), 4);
    }

    #[test]
    fn replay_ignores_changed_arguments() {
        let f = fixture();
        let first = f.service.transfer(f.alice, f.bob, 100, "k1").unwrap();
        let second = f.service.transfer(f.bob, f.alice, 999, "k1").unwrap();
        assert_eq!(first, second);
        assert_eq!(f.balance(f.alice), 99_900);
    }

    #[test]
    fn insufficient_funds_leaves_no_trace() {
        let f = fixture();
        f.service.transfer(f.alice, f.bob, 1_000, "k1").unwrap();
        let entries_before = f.store.ledger_entry_count();
        assert_eq!(entries_before, 4);
        let alice_before = f.balance(f.alice);

        let err = f
            .service
            .transfer(f.alice, f.bob, 200_000, "k2")
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 99_000,
                required: 200_000,
                ..
            }
        ));
        assert_eq!(f.balance(f.alice), alice_before);
        assert_eq!(f.balance(f.bob), 51_000);
        assert!(f.service.find_by_idempotency_key("k2").unwrap().is_none());
        assert_eq!(f.store.ledger_entry_count(), entries_before);
    }

    #[test]
    fn failed_key_can_be_retried() {
        let f = fixture();
        f.service.transfer(f.alice, f.bob, 200_000, "k2").unwrap_err();
        let log = f.service.transfer(f.alice, f.bob, 1_000, "k2").unwrap();
        assert!(log.is_completed());
        assert_eq!(f.balance(f.alice), 99_000);
    }

    #[test]
    fn exact_balance_can_be_sent() {
        let f = fixture();
        f.service.transfer(f.bob, f.alice, 50_000, "all-in").unwrap();
        assert_eq!(f.balance(f.bob), 0);
        assert_eq!(f.balance(f.alice), 150_000);
    }

    #[test]
    fn validation_errors() {
        let f = fixture();
        let clearing = SystemAccounts::default().clearing;
        for (from, to, amount, key) in [
            (f.alice, f.bob, 0, "v1"),
            (f.alice, f.bob, -5, "v2"),
            (f.alice, f.alice, 5, "v3"),
            (f.alice, f.bob, 5, ""),
            (clearing, f.bob, 5, "v4"),
        ] {
            let err = f.service.transfer(from, to, amount, key).unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)), "{err:?}");
        }
        assert_eq!(f.balance(f.alice), 100_000);
    }

    #[test]
    fn unknown_account_is_not_found() {
        let f = fixture();
        let ghost = AccountId::generate();
        let err = f.service.transfer(f.alice, ghost, 5, "ghost").unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound { account_id } if account_id == ghost));
        assert!(f.service.find_by_idempotency_key("ghost").unwrap().is_none());
    }

    #[test]
    fn opposite_transfers_never_deadlock() {
        let f = fixture();
        let service = Arc::new(f.service.clone());
        let rounds = 50;
        let barrier = Arc::new(Barrier::new(2));

        let spawn = |from: AccountId, to: AccountId, tag: &'static str| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                for i in 0..rounds {
                    service
                        .transfer(from, to, 10, &format!("{tag}-{i}"))
                        .unwrap();
                }
            })
        };

        let ab = spawn(f.alice, f.bob, "ab");
        let ba = spawn(f.bob, f.alice, "ba");
        ab.join().unwrap();
        ba.join().unwrap();

        assert_eq!(f.balance(f.alice), 100_000);
        assert_eq!(f.balance(f.bob), 50_000);
    }

    #[test]
    fn racing_duplicate_keys_apply_once() {
        let f = fixture();
        let service = Arc::new(f.service.clone());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                let (alice, bob) = (f.alice, f.bob);
                std::thread::spawn(move || {
                    barrier.wait();
                    service.transfer(alice, bob, 1_000, "race").unwrap()
                })
            })
            .collect();

        let logs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(logs.iter().all(|log| log.id == logs[0].id));
        assert_eq!(f.balance(f.alice), 99_000);
        assert_eq!(f.balance(f.bob), 51_000);
        assert_eq!(f.entries_for(&logs[0]).len(), 4);
    }

    #[test]
    fn held_lock_surfaces_contention_timeout() {
        let f = fixture_with_timeout(Duration::from_millis(50));
        let mut blocker = f.store.begin().unwrap();
        blocker.lock_account(&f.bob).unwrap();

        let err = f.service.transfer(f.alice, f.bob, 10, "blocked").unwrap_err();
        assert!(matches!(err, LedgerError::ContentionTimeout(_)));
        assert!(err.is_retryable());
        drop(blocker);

        assert_eq!(f.balance(f.alice), 100_000);
        assert!(f.service.find_by_idempotency_key("blocked").unwrap().is_none());
        f.service.transfer(f.alice, f.bob, 10, "blocked").unwrap();
    }

    #[test]
    fn reversal_restores_balances() {
        let f = fixture();
        let original = f.service.transfer(f.alice, f.bob, 20_000, "k1").unwrap();
        let reversal = f.service.reverse_transfer(original.id, "k1-undo").unwrap();

        assert!(reversal.is_completed());
        assert_eq!(reversal.from_user_id, f.bob);
        assert_eq!(reversal.to_user_id, f.alice);
        assert_eq!(f.balance(f.alice), 100_000);
        assert_eq!(f.balance(f.bob), 50_000);

        let reversed = f.entries_for(&original);
        assert!(reversed.iter().all(|e| e.status == EntryStatus::Reversed));

        let compensating = f.entries_for(&reversal);
        assert_eq!(compensating.len(), 4);
        assert_eq!(net_amount(&compensating), 0);
        assert!(compensating
            .iter()
            .all(|e| e.reference_type == ReferenceType::Reversal));
        let alice_credit = compensating
            .iter()
            .find(|e| e.account_id == f.alice)
            .unwrap();
        assert_eq!(alice_credit.entry_type, EntryType::Credit);
    }

    #[test]
    fn second_reversal_is_rejected() {
        let f = fixture();
        let original = f.service.transfer(f.alice, f.bob, 500, "k1").unwrap();
        f.service.reverse_transfer(original.id, "undo-1").unwrap();

        let err = f
            .service
            .reverse_transfer(original.id, "undo-2")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStatusTransition { .. }));
        assert_eq!(f.balance(f.alice), 100_000);

        // Same key replays the first reversal.
        let replay = f.service.reverse_transfer(original.id, "undo-1").unwrap();
        assert!(replay.is_completed());
    }

    #[test]
    fn reversal_cannot_be_reversed() {
        let f = fixture();
        let original = f.service.transfer(f.alice, f.bob, 100, "t").unwrap();
        let reversal = f.service.reverse_transfer(original.id, "r").unwrap();
        assert_eq!(reversal.reverses, Some(original.id));
        assert!(original.reverses.is_none());

        let err = f.service.reverse_transfer(reversal.id, "rr").unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(f.balance(f.alice), 100_000);
        assert_eq!(f.balance(f.bob), 50_000);
        assert!(f.service.find_by_idempotency_key("rr").unwrap().is_none());
        assert!(f
            .entries_for(&reversal)
            .iter()
            .all(|e| e.status == EntryStatus::Posted));
    }

    #[test]
    fn reversal_needs_recipient_funds() {
        let f = fixture();
        let original = f.service.transfer(f.alice, f.bob, 20_000, "k1").unwrap();
        f.service.transfer(f.bob, f.alice, 70_000, "drain").unwrap();

        let err = f
            .service
            .reverse_transfer(original.id, "undo")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(f
            .entries_for(&original)
            .iter()
            .all(|e| e.status == EntryStatus::Posted));
    }

    #[test]
    fn reversing_unknown_transfer_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .reverse_transfer(TransactionLogId::generate(), "undo")
            .unwrap_err();
        assert!(matches!(err, LedgerError::TransferNotFound { .. }));
    }

    #[test]
    fn read_operations() {
        let f = fixture();
        let log = f.service.transfer(f.alice, f.bob, 1, "k1").unwrap();
        let entries = f.service.ledger_entries_for_reference(log.id.as_uuid()).unwrap();
        let by_tx = f.service.ledger_entries(&entries[0].transaction_id).unwrap();
        assert_eq!(entries, by_tx);
        assert_eq!(f.service.get_account(f.bob).unwrap().balance, 50_001);
        assert!(matches!(
            f.service.get_account(AccountId::generate()),
            Err(LedgerError::AccountNotFound { .. })
        ));
    }
}
