//! Common test utilities for fundsflow integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;

use fundsflow_core::{Account, AccountId};
use fundsflow_service::provisioning::ensure_system_accounts;
use fundsflow_service::{create_router, AppState, ServiceConfig};
use fundsflow_store::{MemoryStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the store, for setup and assertions.
    pub store: Arc<MemoryStore>,
    /// Configuration the router was built with.
    pub config: ServiceConfig,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store and system accounts.
    pub fn new() -> Self {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            lock_timeout_ms: 200,
            ..ServiceConfig::default()
        };
        let store = Arc::new(MemoryStore::new(Duration::from_millis(config.lock_timeout_ms)));
        ensure_system_accounts(store.as_ref(), &config.system_accounts)
            .expect("Failed to provision system accounts");

        let state = AppState::new(store.clone(), config.clone());
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            config,
        }
    }

    /// Create a user account with an opening balance.
    pub fn open_account(&self, name: &str, balance: i64) -> AccountId {
        let id = AccountId::generate();
        self.store
            .put_account(&Account::new(id, Some(name.to_string()), balance))
            .expect("Failed to create account");
        id
    }

    /// Committed balance of an account.
    pub fn balance(&self, id: AccountId) -> i64 {
        self.store
            .get_account(&id)
            .expect("Failed to read account")
            .expect("Account missing")
            .balance
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
