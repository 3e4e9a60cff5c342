//! Account handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use fundsflow_core::{Account, AccountId, AccountKind, LedgerError};

use super::blocking;
use crate::error::ApiError;
use crate::state::AppState;

/// Account response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Current balance in minor units.
    pub balance: i64,
    /// "user" or "system".
    pub kind: AccountKind,
    /// Last day interest was applied.
    pub last_accrued_on: Option<String>,
    /// Created timestamp.
    pub created_at: String,
    /// Updated timestamp.
    pub updated_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            name: account.name.clone(),
            balance: account.balance,
            kind: account.kind,
            last_accrued_on: account.last_accrued_on.map(|d| d.to_string()),
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

/// Get an account and its balance.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id: AccountId = account_id.parse().map_err(LedgerError::from)?;
    let transfers = state.transfers.clone();
    let account = blocking(move || transfers.get_account(account_id)).await?;
    Ok(Json(AccountResponse::from(&account)))
}
