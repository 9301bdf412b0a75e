//! Database operations for the `SQLite` store.
//!
//! ## Tables
//!
//! - `products` - Catalog, written only by the seeding command
//! - `cart_lines` - One row per product in the cart (`UNIQUE (product_id)`)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/`, embedded at compile time,
//! and run via:
//! ```bash
//! shopkeep migrate
//! ```

pub mod cart;
pub mod products;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use thiserror::Error;

pub use cart::CartRepository;
pub use products::{ProductFilter, ProductRepository};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// SQLite primary result codes for lock contention
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (unique, check, or foreign key).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The database was locked for longer than the busy timeout.
    #[error("database busy: {0}")]
    Busy(String),
}

impl RepositoryError {
    /// Classify a write error: lock contention, constraint violation, or other.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => {
                Self::Busy("timed out waiting for a connection".to_owned())
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                // Extended result codes keep the primary code in the low byte
                let primary = code
                    .as_deref()
                    .and_then(|c| c.parse::<i64>().ok())
                    .map(|c| (c & 0xff).to_string());
                if matches!(primary.as_deref(), Some(SQLITE_BUSY | SQLITE_LOCKED)) {
                    return Self::Busy(db_err.message().to_owned());
                }
                if db_err.is_unique_violation()
                    || db_err.is_check_violation()
                    || db_err.is_foreign_key_violation()
                {
                    return Self::Conflict(db_err.message().to_owned());
                }
                Self::Database(err)
            }
            _ => Self::Database(err),
        }
    }

    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// Every connection enforces foreign keys, runs in WAL mode, and waits at most
/// `timeout` for a write lock before failing with `SQLITE_BUSY`.
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (wrapped in `SecretString`)
/// * `timeout` - Pool acquire timeout and `SQLite` busy timeout
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the database cannot be opened.
pub async fn create_pool(
    database_url: &SecretString,
    timeout: Duration,
) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    let in_memory = url.contains(":memory:") || url.contains("mode=memory");

    let mut options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(timeout);
    if !in_memory {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    // Each in-memory connection is its own database, so keep exactly one
    let (max, min) = if in_memory { (1, 1) } else { (10, 1) };

    SqlitePoolOptions::new()
        .max_connections(max)
        .min_connections(min)
        .acquire_timeout(timeout)
        .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(600)) })
        .max_lifetime(if in_memory { None } else { Some(Duration::from_secs(1800)) })
        .connect_with(options)
        .await
}

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
