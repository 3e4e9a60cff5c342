//! Daily interest accrual.
//!
//! Each account is accrued in its own unit of work that locks the account and the
//! interest-expense account in canonical order, re-reads the balance under the lock and
//! posts a balanced DEBIT interest-expense / CREDIT account pair. `last_accrued_on` keeps
//! a pass at most once per account per day, so a rerun after a partial failure only picks
//! up the accounts that were missed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use fundsflow_core::ledger::{accrual_legs, ensure_balanced};
use fundsflow_core::{
    AccountId, InterestPolicy, LedgerError, Result, SystemAccounts, TransactionId,
};
use fundsflow_store::Store;

use crate::locking::lock_pair;

/// Outcome of one accrual pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccrualSummary {
    /// Reference id recorded on every entry the pass posted.
    pub run_id: uuid::Uuid,
    /// Day the pass accrued for.
    pub accrual_date: NaiveDate,
    /// User accounts examined.
    pub accounts_scanned: usize,
    /// Accounts that received interest.
    pub accounts_credited: usize,
    /// Accounts whose interest rounded to zero or below.
    pub accounts_skipped: usize,
    /// Accounts already accrued for `accrual_date`.
    pub already_accrued: usize,
    /// Accounts left for a later pass because their locks timed out.
    pub deferred: Vec<AccountId>,
    /// Interest credited by this pass, in minor units.
    pub total_interest: i64,
}

impl AccrualSummary {
    fn new(run_id: uuid::Uuid, accrual_date: NaiveDate) -> Self {
        Self {
            run_id,
            accrual_date,
            accounts_scanned: 0,
            accounts_credited: 0,
            accounts_skipped: 0,
            already_accrued: 0,
            deferred: Vec::new(),
            total_interest: 0,
        }
    }
}

enum AccountOutcome {
    Credited(i64),
    Skipped,
    AlreadyAccrued,
}

/// Applies daily interest to every user account.
#[derive(Clone)]
pub struct InterestAccrualJob {
    store: Arc<dyn Store>,
    system: SystemAccounts,
    policy: InterestPolicy,
}

impl InterestAccrualJob {
    /// Create a job over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, system: SystemAccounts, policy: InterestPolicy) -> Self {
        Self {
            store,
            system,
            policy,
        }
    }

    /// Accrue one day of interest for today (UTC).
    ///
    /// # Errors
    ///
    /// Any error other than lock contention aborts the pass. Accounts committed before the
    /// failure keep their interest.
    pub fn apply_daily_interest(&self) -> Result<AccrualSummary> {
        self.apply_for_date(Utc::now().date_naive())
    }

    /// Accrue one day of interest for `date`.
    ///
    /// # Errors
    ///
    /// See [`Self::apply_daily_interest`].
    pub fn apply_for_date(&self, date: NaiveDate) -> Result<AccrualSummary> {
        let run_id = uuid::Uuid::new_v4();
        let mut summary = AccrualSummary::new(run_id, date);

        tracing::info!(%run_id, %date, "Interest accrual started");

        for account in self.store.list_accounts()? {
            if account.is_system() || self.system.contains(&account.id) {
                continue;
            }
            summary.accounts_scanned += 1;

            match self.accrue_account(account.id, date, run_id) {
                Ok(AccountOutcome::Credited(interest)) => {
                    summary.accounts_credited += 1;
                    summary.total_interest = summary.total_interest.saturating_add(interest);
                }
                Ok(AccountOutcome::Skipped) => summary.accounts_skipped += 1,
                Ok(AccountOutcome::AlreadyAccrued) => summary.already_accrued += 1,
                Err(LedgerError::ContentionTimeout(row)) => {
                    tracing::warn!(account_id = %account.id, %row, "Accrual deferred by lock contention");
                    summary.deferred.push(account.id);
                }
                Err(e) => {
                    tracing::error!(account_id = %account.id, %run_id, error = %e, "Interest accrual aborted");
                    return Err(e);
                }
            }
        }

        tracing::info!(
            %run_id,
            scanned = summary.accounts_scanned,
            credited = summary.accounts_credited,
            skipped = summary.accounts_skipped,
            already_accrued = summary.already_accrued,
            deferred = summary.deferred.len(),
            total_interest = summary.total_interest,
            "Interest accrual finished"
        );
        Ok(summary)
    }

    fn accrue_account(
        &self,
        account_id: AccountId,
        date: NaiveDate,
        run_id: uuid::Uuid,
    ) -> Result<AccountOutcome> {
        let mut unit = self.store.begin()?;
        let (mut account, mut expense) =
            lock_pair(&mut *unit, account_id, self.system.interest_expense)?;

        if account.last_accrued_on.is_some_and(|last| last >= date) {
            return Ok(AccountOutcome::AlreadyAccrued);
        }

        let interest = self.policy.daily_interest(account.balance)?;
        if interest <= 0 {
            return Ok(AccountOutcome::Skipped);
        }

        let transaction_id = TransactionId::generate();
        let legs = accrual_legs(
            transaction_id,
            self.system.interest_expense,
            account_id,
            interest,
            run_id,
        );
        ensure_balanced(&legs)?;
        for leg in &legs {
            unit.insert_ledger_entry(leg)?;
        }

        account.credit(interest)?;
        account.last_accrued_on = Some(date);
        expense.apply_delta(-interest)?;
        unit.update_account(&account)?;
        unit.update_account(&expense)?;
        unit.commit()?;

        tracing::debug!(%account_id, interest, %transaction_id, "Interest credited");
        Ok(AccountOutcome::Credited(interest))
    }
}

/// Run `job` every `period` on the blocking pool. The first run happens one full period
/// after the call.
pub fn spawn_scheduler(job: Arc<InterestAccrualJob>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(period_secs = period.as_secs(), "Interest accrual scheduler started");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let job = Arc::clone(&job);
            match tokio::task::spawn_blocking(move || job.apply_daily_interest()).await {
                Ok(Ok(summary)) if !summary.deferred.is_empty() => {
                    tracing::warn!(
                        run_id = %summary.run_id,
                        deferred = summary.deferred.len(),
                        "Scheduled accrual left accounts for the next run"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Scheduled interest accrual failed"),
                Err(e) => tracing::error!(error = %e, "Scheduled interest accrual panicked"),
            }
        }
    })
}
