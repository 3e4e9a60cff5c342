//! Application state.

use std::sync::Arc;

use fundsflow_store::Store;

use crate::accrual::InterestAccrualJob;
use crate::config::ServiceConfig;
use crate::transfers::TransferService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Transfer orchestrator.
    pub transfers: TransferService,

    /// Interest accrual job.
    pub accrual: Arc<InterestAccrualJob>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let transfers = TransferService::new(Arc::clone(&store), config.system_accounts);
        let accrual = Arc::new(InterestAccrualJob::new(
            Arc::clone(&store),
            config.system_accounts,
            config.interest,
        ));

        tracing::info!(
            clearing = %config.system_accounts.clearing,
            interest_expense = %config.system_accounts.interest_expense,
            annual_rate = %config.interest.annual_rate,
            days_in_year = config.interest.days_in_year,
            "Ledger services configured"
        );

        Self {
            store,
            config,
            transfers,
            accrual,
        }
    }
}
