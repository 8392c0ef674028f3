//! Environment-keyed storage configuration.
//!
//! Recognized variables:
//! - `EVENTSTORE_DRIVER`: `memory` | `sync_db` | `async_db` (`sqlite` is an
//!   accepted alias for `sync_db`).
//! - `DATABASE_NAME`, `DATABASE_HOST`, `DATABASE_PORT`, `DATABASE_USER`,
//!   `DATABASE_PASSWORD`, `DATABASE_SSL_MODE`, `DATABASE_POOL_MIN`,
//!   `DATABASE_POOL_MAX`, `DATABASE_CONNECT_TIMEOUT`.
//! - `DATABASE_LOCK_TIMEOUT_MS`, `DATABASE_STATEMENT_TIMEOUT_MS`,
//!   `DATABASE_IDLE_ABORT_MS`: the three bounded-blocking knobs.
//!
//! The embedded backend uses `DATABASE_NAME` as its on-disk path; the
//! server-oriented connection settings are parsed so a networked deployment
//! can be configured without inventing new keys, and exposed on
//! [`DatabaseConfig`] for such a backend to consume.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use attesta_contracts::{LedgerError, LedgerResult};

use crate::memory::MemoryEventStore;
use crate::sqlite::SqliteEventStore;
use crate::store::EventStore;

/// Default lock-acquisition timeout (2 s order, per the concurrency model).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);
/// Default per-statement deadline (10 s order).
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default ceiling for a transaction held idle before it is aborted.
pub const DEFAULT_IDLE_CEILING: Duration = Duration::from_secs(30);

/// Which EventStore backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDriver {
    /// Process-local, no persistence. Development and tests.
    Memory,
    /// The durable embedded relational backend (synchronous surface).
    SyncDb,
    /// Accepted for configuration compatibility; the stack is synchronous,
    /// so this resolves to the same durable backend.
    AsyncDb,
}

impl StoreDriver {
    pub fn parse(value: &str) -> Option<StoreDriver> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Some(StoreDriver::Memory),
            "sync_db" | "sqlite" => Some(StoreDriver::SyncDb),
            "async_db" => Some(StoreDriver::AsyncDb),
            _ => None,
        }
    }
}

/// Connection settings for the durable backend.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Database name; doubles as the file path for the embedded backend.
    pub name: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: String,
    pub pool_min: u32,
    pub pool_max: u32,
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "attesta.db".to_string(),
            user: "attesta".to_string(),
            password: String::new(),
            ssl_mode: "prefer".to_string(),
            pool_min: 2,
            pool_max: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> DatabaseConfig {
        let defaults = DatabaseConfig::default();
        DatabaseConfig {
            host: env_or("DATABASE_HOST", defaults.host),
            port: env_parse("DATABASE_PORT", defaults.port),
            name: env_or("DATABASE_NAME", defaults.name),
            user: env_or("DATABASE_USER", defaults.user),
            password: env_or("DATABASE_PASSWORD", defaults.password),
            ssl_mode: env_or("DATABASE_SSL_MODE", defaults.ssl_mode),
            pool_min: env_parse("DATABASE_POOL_MIN", defaults.pool_min),
            pool_max: env_parse("DATABASE_POOL_MAX", defaults.pool_max),
            connect_timeout: Duration::from_secs(env_parse(
                "DATABASE_CONNECT_TIMEOUT",
                defaults.connect_timeout.as_secs(),
            )),
        }
    }

    /// The on-disk path the embedded backend stores the ledger at.
    pub fn sqlite_path(&self) -> PathBuf {
        PathBuf::from(&self.name)
    }
}

/// Full storage configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub driver: StoreDriver,
    pub database: DatabaseConfig,
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
    pub idle_ceiling: Duration,
}

impl StoreConfig {
    /// Load configuration from the environment.
    ///
    /// With no `EVENTSTORE_DRIVER` set, the driver is `sync_db` when a
    /// database is configured (`DATABASE_NAME` or `DATABASE_HOST` present)
    /// and `memory` otherwise.
    pub fn from_env() -> LedgerResult<StoreConfig> {
        let driver = match std::env::var("EVENTSTORE_DRIVER") {
            Ok(raw) if !raw.is_empty() => {
                StoreDriver::parse(&raw).ok_or_else(|| LedgerError::Config {
                    reason: format!(
                        "unknown EVENTSTORE_DRIVER '{raw}'; valid values: memory, sync_db, async_db"
                    ),
                })?
            }
            _ => {
                let db_configured = std::env::var("DATABASE_NAME").is_ok()
                    || std::env::var("DATABASE_HOST").is_ok();
                if db_configured {
                    StoreDriver::SyncDb
                } else {
                    StoreDriver::Memory
                }
            }
        };

        Ok(StoreConfig {
            driver,
            database: DatabaseConfig::from_env(),
            lock_timeout: Duration::from_millis(env_parse(
                "DATABASE_LOCK_TIMEOUT_MS",
                DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            )),
            statement_timeout: Duration::from_millis(env_parse(
                "DATABASE_STATEMENT_TIMEOUT_MS",
                DEFAULT_STATEMENT_TIMEOUT.as_millis() as u64,
            )),
            idle_ceiling: Duration::from_millis(env_parse(
                "DATABASE_IDLE_ABORT_MS",
                DEFAULT_IDLE_CEILING.as_millis() as u64,
            )),
        })
    }

    /// Construct the configured EventStore backend.
    pub fn open(&self) -> LedgerResult<Box<dyn EventStore>> {
        match self.driver {
            StoreDriver::Memory => {
                info!("event store: in-memory (no persistence)");
                Ok(Box::new(MemoryEventStore::with_timeouts(
                    self.lock_timeout,
                    self.idle_ceiling,
                )))
            }
            StoreDriver::SyncDb | StoreDriver::AsyncDb => {
                let path = self.database.sqlite_path();
                info!(path = %path.display(), "event store: durable");
                Ok(Box::new(SqliteEventStore::open_with_timeouts(
                    path,
                    self.lock_timeout,
                    self.statement_timeout,
                    self.idle_ceiling,
                )?))
            }
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
