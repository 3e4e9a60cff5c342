//! Interest accrual handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::blocking;
use crate::accrual::AccrualSummary;
use crate::error::ApiError;
use crate::state::AppState;

/// Accrual response.
#[derive(Debug, Serialize)]
pub struct AccrualResponse {
    /// Outcome message.
    pub message: String,
    /// Pass summary.
    pub summary: AccrualSummary,
}

/// Run one accrual pass for today.
pub async fn accrue_interest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AccrualResponse>, ApiError> {
    let job = Arc::clone(&state.accrual);
    let summary = blocking(move || job.apply_daily_interest()).await?;

    Ok(Json(AccrualResponse {
        message: "Interest accrued".into(),
        summary,
    }))
}
