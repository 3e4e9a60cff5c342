//! Ledger handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use fundsflow_core::ledger::net_amount;
use fundsflow_core::{EntryStatus, EntryType, LedgerEntry, LedgerError, ReferenceType, TransactionId};

use super::blocking;
use crate::error::ApiError;
use crate::state::AppState;

/// Ledger entry response.
#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    /// Entry ID.
    pub id: String,
    /// Ledger transaction ID.
    pub transaction_id: String,
    /// Account moved.
    pub account_id: String,
    /// DEBIT or CREDIT.
    pub entry_type: EntryType,
    /// Amount in minor units.
    pub amount: i64,
    /// PENDING, POSTED or REVERSED.
    pub status: EntryStatus,
    /// TRANSFER, INTEREST or REVERSAL.
    pub reference_type: ReferenceType,
    /// Transaction log or accrual run ID.
    pub reference_id: String,
    /// Created timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for LedgerEntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            transaction_id: entry.transaction_id.to_string(),
            account_id: entry.account_id.to_string(),
            entry_type: entry.entry_type,
            amount: entry.amount,
            status: entry.status,
            reference_type: entry.reference_type,
            reference_id: entry.reference_id.to_string(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// One ledger transaction.
#[derive(Debug, Serialize)]
pub struct LedgerTransactionResponse {
    /// Ledger transaction ID.
    pub transaction_id: String,
    /// Whether credits minus debits is zero.
    pub balanced: bool,
    /// Entries of the transaction.
    pub entries: Vec<LedgerEntryResponse>,
}

/// Get the entries of one ledger transaction.
pub async fn get_ledger_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<LedgerTransactionResponse>, ApiError> {
    let transaction_id: TransactionId = transaction_id.parse().map_err(LedgerError::from)?;
    let transfers = state.transfers.clone();
    let entries = blocking(move || transfers.ledger_entries(&transaction_id)).await?;

    if entries.is_empty() {
        return Err(ApiError::NotFound {
            code: "ledger_transaction_not_found",
            message: format!("ledger transaction not found: {transaction_id}"),
        });
    }

    Ok(Json(LedgerTransactionResponse {
        transaction_id: transaction_id.to_string(),
        balanced: net_amount(&entries) == 0,
        entries: entries.iter().map(LedgerEntryResponse::from).collect(),
    }))
}
