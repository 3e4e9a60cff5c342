//! Fundsflow service.
//!
//! This crate composes the core ledger types and the storage layer into the two
//! operations that move money:
//!
//! - [`TransferService`]: idempotent, atomic transfers (and reversals) between accounts
//! - [`InterestAccrualJob`]: daily interest posted against the interest-expense account
//!
//! plus the HTTP API, configuration and startup provisioning around them.
//!
//! # Concurrency
//!
//! Store calls block on row locks, so the HTTP handlers and the accrual scheduler run
//! every operation on the blocking thread pool.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result

pub mod accrual;
pub mod config;
pub mod error;
pub mod handlers;
mod locking;
pub mod provisioning;
pub mod routes;
pub mod state;
pub mod transfers;

pub use accrual::{spawn_scheduler, AccrualSummary, InterestAccrualJob};
pub use config::{ServiceConfig, StorageBackend};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use transfers::TransferService;
