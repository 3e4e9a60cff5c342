//! Fundsflow Service - HTTP API for transfers and interest accrual
//!
//! This is the main entry point for the fundsflow service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fundsflow_service::provisioning::{ensure_system_accounts, seed_demo_accounts};
use fundsflow_service::{create_router, spawn_scheduler, AppState, ServiceConfig, StorageBackend};
use fundsflow_store::{MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fundsflow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Fundsflow Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage_backend,
        data_dir = %config.data_dir,
        lock_timeout_ms = config.lock_timeout_ms,
        accrual_interval_seconds = ?config.accrual_interval_seconds,
        seed_demo_accounts = config.seed_demo_accounts,
        "Service configuration loaded"
    );

    let store = open_store(&config)?;

    // Provision system accounts and demo data
    ensure_system_accounts(store.as_ref(), &config.system_accounts)?;
    if config.seed_demo_accounts {
        let seeded = seed_demo_accounts(store.as_ref())?;
        tracing::info!(count = seeded.len(), "Demo accounts ready");
    }

    // Build app state
    let state = AppState::new(store, config.clone());

    if let Some(period) = config.accrual_interval() {
        spawn_scheduler(Arc::clone(&state.accrual), period);
    }

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store - state is lost on restart");
            Ok(Arc::new(MemoryStore::new(config.lock_timeout())))
        }
        #[cfg(feature = "rocksdb-backend")]
        StorageBackend::RocksDb => {
            tracing::info!(path = %config.data_dir, "Opening RocksDB store");
            Ok(Arc::new(fundsflow_store::RocksStore::open_with_lock_timeout(
                &config.data_dir,
                config.lock_timeout(),
            )?))
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StorageBackend::RocksDb => {
            Err("STORAGE_BACKEND=rocksdb requires building with the rocksdb-backend feature".into())
        }
    }
}
