//! Transfer handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fundsflow_core::{AccountId, LedgerError, TransactionLog, TransactionLogId, TransferStatus};

use super::blocking;
use super::ledger::LedgerEntryResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Transfer request body.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    /// Paying account.
    pub from_user_id: AccountId,
    /// Receiving account.
    pub to_user_id: AccountId,
    /// Amount in minor units.
    pub amount: i64,
    /// Caller-chosen key; retries with the same key are applied once.
    pub idempotency_key: String,
}

/// Reversal request body.
#[derive(Debug, Deserialize)]
pub struct ReversalRequest {
    /// Key of the reversal itself.
    pub idempotency_key: String,
}

/// Transaction log response.
#[derive(Debug, Serialize)]
pub struct TransactionLogResponse {
    /// Log ID.
    pub id: String,
    /// Idempotency key.
    pub idempotency_key: String,
    /// Paying account.
    pub from_user_id: String,
    /// Receiving account.
    pub to_user_id: String,
    /// Amount in minor units.
    pub amount: i64,
    /// PENDING, COMPLETED or FAILED.
    pub status: TransferStatus,
    /// Log this one reverses, set on reversals only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverses: Option<TransactionLogId>,
    /// Created timestamp.
    pub created_at: String,
    /// Updated timestamp.
    pub updated_at: String,
}

impl From<&TransactionLog> for TransactionLogResponse {
    fn from(log: &TransactionLog) -> Self {
        Self {
            id: log.id.to_string(),
            idempotency_key: log.idempotency_key.clone(),
            from_user_id: log.from_user_id.to_string(),
            to_user_id: log.to_user_id.to_string(),
            amount: log.amount,
            status: log.status,
            reverses: log.reverses,
            created_at: log.created_at.to_rfc3339(),
            updated_at: log.updated_at.to_rfc3339(),
        }
    }
}

/// Response to a transfer or reversal.
#[derive(Debug, Serialize)]
pub struct TransferResponse {
    /// Outcome message.
    pub message: String,
    /// The transaction log.
    pub transaction: TransactionLogResponse,
}

/// Ledger entries recorded for one transfer.
#[derive(Debug, Serialize)]
pub struct TransferEntriesResponse {
    /// The transaction log.
    pub transaction: TransactionLogResponse,
    /// Entries referencing the log.
    pub entries: Vec<LedgerEntryResponse>,
}

/// Initiate a transfer.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let transfers = state.transfers.clone();
    let log = blocking(move || {
        transfers.transfer(
            body.from_user_id,
            body.to_user_id,
            body.amount,
            &body.idempotency_key,
        )
    })
    .await?;

    Ok(Json(TransferResponse {
        message: "Transfer successful".into(),
        transaction: TransactionLogResponse::from(&log),
    }))
}

/// Look up a transfer by idempotency key.
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<TransactionLogResponse>, ApiError> {
    let transfers = state.transfers.clone();
    let log = blocking(move || find_log(&transfers, &key)).await?;
    Ok(Json(TransactionLogResponse::from(&log)))
}

/// List the ledger entries recorded for a transfer, by idempotency key.
pub async fn list_transfer_entries(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<TransferEntriesResponse>, ApiError> {
    let transfers = state.transfers.clone();
    let (log, entries) = blocking(move || {
        let log = find_log(&transfers, &key)?;
        let entries = transfers.ledger_entries_for_reference(log.id.as_uuid())?;
        Ok((log, entries))
    })
    .await?;

    Ok(Json(TransferEntriesResponse {
        transaction: TransactionLogResponse::from(&log),
        entries: entries.iter().map(LedgerEntryResponse::from).collect(),
    }))
}

/// Reverse a completed transfer, by transaction log id.
pub async fn reverse_transfer(
    State(state): State<Arc<AppState>>,
    Path(log_id): Path<String>,
    Json(body): Json<ReversalRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let log_id: TransactionLogId = log_id.parse().map_err(LedgerError::from)?;
    let transfers = state.transfers.clone();
    let log = blocking(move || transfers.reverse_transfer(log_id, &body.idempotency_key)).await?;

    Ok(Json(TransferResponse {
        message: "Transfer reversed".into(),
        transaction: TransactionLogResponse::from(&log),
    }))
}

fn find_log(
    transfers: &crate::transfers::TransferService,
    key: &str,
) -> fundsflow_core::Result<TransactionLog> {
    transfers
        .find_by_idempotency_key(key)?
        .ok_or_else(|| LedgerError::TransferNotFound { id: key.to_string() })
}
