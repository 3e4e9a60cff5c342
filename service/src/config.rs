//! Service configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use fundsflow_core::{
    AccountId, InterestPolicy, SystemAccounts, DEFAULT_ANNUAL_RATE, DEFAULT_DAYS_IN_YEAR,
};

/// Which storage backend the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process tables; state is lost on restart.
    Memory,
    /// `RocksDB` under `data_dir` (requires the `rocksdb-backend` feature).
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rocksdb" => Ok(Self::RocksDb),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::RocksDb => "rocksdb",
        })
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Storage backend (default: memory).
    pub storage_backend: StorageBackend,

    /// Path to the `RocksDB` data directory (default: "/data/fundsflow").
    pub data_dir: String,

    /// Bound on a single row lock wait, in milliseconds (default: 5000).
    pub lock_timeout_ms: u64,

    /// Clearing and interest-expense account ids.
    pub system_accounts: SystemAccounts,

    /// Interest rate parameters.
    pub interest: InterestPolicy,

    /// Period of the accrual scheduler. `None` disables it.
    pub accrual_interval_seconds: Option<u64>,

    /// Create demo accounts on an empty store.
    pub seed_demo_accounts: bool,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            storage_backend: StorageBackend::Memory,
            data_dir: "/data/fundsflow".into(),
            lock_timeout_ms: 5000,
            system_accounts: SystemAccounts::default(),
            interest: InterestPolicy::default(),
            accrual_interval_seconds: None,
            seed_demo_accounts: false,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_seconds: 30,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables take their defaults. Unparseable values are logged and replaced
    /// by the default as well.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let system_accounts = SystemAccounts {
            clearing: env_parse::<AccountId>("CLEARING_ACCOUNT_ID")
                .unwrap_or(defaults.system_accounts.clearing),
            interest_expense: env_parse::<AccountId>("INTEREST_EXPENSE_ACCOUNT_ID")
                .unwrap_or(defaults.system_accounts.interest_expense),
        };

        let annual_rate = env_parse::<Decimal>("ANNUAL_INTEREST_RATE").unwrap_or(DEFAULT_ANNUAL_RATE);
        let days_in_year = env_parse::<u32>("DAYS_IN_YEAR").unwrap_or(DEFAULT_DAYS_IN_YEAR);
        let interest = InterestPolicy::new(annual_rate, days_in_year).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Invalid interest settings, using defaults");
            InterestPolicy::default()
        });

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            storage_backend: env_parse("STORAGE_BACKEND").unwrap_or(defaults.storage_backend),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            lock_timeout_ms: env_parse("LOCK_TIMEOUT_MS").unwrap_or(defaults.lock_timeout_ms),
            system_accounts,
            interest,
            accrual_interval_seconds: env_parse::<u64>("ACCRUAL_INTERVAL_SECONDS")
                .filter(|&s| s > 0),
            seed_demo_accounts: env_parse("SEED_DEMO_ACCOUNTS")
                .unwrap_or(defaults.seed_demo_accounts),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }

    /// Row lock wait bound.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Accrual scheduler period, if enabled.
    #[must_use]
    pub fn accrual_interval(&self) -> Option<Duration> {
        self.accrual_interval_seconds.map(Duration::from_secs)
    }
}

/// Read and parse an environment variable, warning when it is set but invalid.
fn env_parse<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(variable = name, value = %raw, error = %e, "Ignoring invalid setting");
            None
        }
    }
}
