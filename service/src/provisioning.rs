//! Startup provisioning: system accounts and optional demo data.

use fundsflow_core::{Account, AccountId, Result, SystemAccounts};
use fundsflow_store::Store;

/// Demo user accounts and their opening balances.
pub const DEMO_ACCOUNTS: [(&str, i64); 4] = [
    ("Alice", 100_000),
    ("Bob", 50_000),
    ("Charlie", 75_000),
    ("NewUser", 0),
];

/// Create the clearing and interest-expense accounts if they do not exist yet.
///
/// Existing accounts are left untouched, balances included.
///
/// # Errors
///
/// `Persistence` if the store fails.
pub fn ensure_system_accounts(store: &dyn Store, system: &SystemAccounts) -> Result<()> {
    for (id, name) in [
        (system.clearing, "clearing"),
        (system.interest_expense, "interest-expense"),
    ] {
        if store.get_account(&id)?.is_none() {
            store.put_account(&Account::system(id, name))?;
            tracing::info!(account_id = %id, name, "Created system account");
        }
    }
    Ok(())
}

/// Create the demo accounts when the store holds no user accounts.
///
/// Returns the accounts created, which is empty if user accounts already existed.
///
/// # Errors
///
/// `Persistence` if the store fails.
pub fn seed_demo_accounts(store: &dyn Store) -> Result<Vec<Account>> {
    if store.list_accounts()?.iter().any(|a| !a.is_system()) {
        tracing::debug!("User accounts present, skipping demo seed");
        return Ok(Vec::new());
    }

    let mut created = Vec::with_capacity(DEMO_ACCOUNTS.len());
    for (name, balance) in DEMO_ACCOUNTS {
        let account = Account::new(AccountId::generate(), Some(name.to_string()), balance);
        store.put_account(&account)?;
        tracing::info!(account_id = %account.id, name, balance, "Seeded demo account");
        created.push(account);
    }
    Ok(created)
}
