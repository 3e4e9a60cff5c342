//! Canonical account lock ordering.

use fundsflow_core::{Account, AccountId, LedgerError, Result};
use fundsflow_store::UnitOfWork;

/// Lock two accounts in ascending id order and return them in argument order.
///
/// Every multi-account caller goes through here, so opposite-direction transfers never
/// wait on each other in a cycle.
pub(crate) fn lock_pair(
    unit: &mut (dyn UnitOfWork + '_),
    first: AccountId,
    second: AccountId,
) -> Result<(Account, Account)> {
    let swapped = second < first;
    let (low, high) = if swapped {
        (second, first)
    } else {
        (first, second)
    };

    let low_row = lock_existing(unit, low)?;
    let high_row = lock_existing(unit, high)?;
    tracing::debug!(%low, %high, "account locks acquired");

    Ok(if swapped {
        (high_row, low_row)
    } else {
        (low_row, high_row)
    })
}

fn lock_existing(unit: &mut (dyn UnitOfWork + '_), account_id: AccountId) -> Result<Account> {
    unit.lock_account(&account_id)?
        .ok_or(LedgerError::AccountNotFound { account_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundsflow_store::{MemoryStore, Store};

    #[test]
    fn returns_accounts_in_argument_order() {
        let store = MemoryStore::default();
        let mut ids = [AccountId::generate(), AccountId::generate()];
        ids.sort();
        for (i, id) in ids.iter().enumerate() {
            store
                .put_account(&Account::new(*id, None, i64::try_from(i).unwrap()))
                .unwrap();
        }

        let mut unit = store.begin().unwrap();
        let (a, b) = lock_pair(&mut *unit, ids[1], ids[0]).unwrap();
        assert_eq!(a.id, ids[1]);
        assert_eq!(b.id, ids[0]);
    }

    #[test]
    fn missing_account_is_reported() {
        let store = MemoryStore::default();
        let present = AccountId::generate();
        store.put_account(&Account::new(present, None, 0)).unwrap();
        let missing = AccountId::generate();

        let mut unit = store.begin().unwrap();
        let err = lock_pair(&mut *unit, present, missing).unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound { account_id } if account_id == missing));
    }
}
