//! Subcommand implementations.
//!
//! # Environment Variables
//!
//! - `SHOPKEEP_DATABASE_URL` - `SQLite` connection string (falls back to `DATABASE_URL`)
//! - `SHOPKEEP_STORE_TIMEOUT_MS` - Busy timeout (default: 5000)

pub mod migrate;
pub mod products;
pub mod seed;

use std::time::Duration;

use secrecy::SecretString;
use sqlx::SqlitePool;
use thiserror::Error;

use shopkeep_api::db;

/// Errors that can occur before a command reaches the database.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing environment variable: SHOPKEEP_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Invalid SHOPKEEP_STORE_TIMEOUT_MS: {0}")]
    InvalidTimeout(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the database named by the environment.
///
/// # Errors
///
/// Returns `CommandError` if the URL is missing or the database cannot be
/// opened.
pub async fn connect() -> Result<SqlitePool, CommandError> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let database_url = std::env::var("SHOPKEEP_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingDatabaseUrl)?;

    let timeout_ms = match std::env::var("SHOPKEEP_STORE_TIMEOUT_MS") {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| CommandError::InvalidTimeout(e.to_string()))?,
        Err(_) => 5000,
    };

    let pool = db::create_pool(&database_url, Duration::from_millis(timeout_ms)).await?;
    tracing::info!("Connected to database");
    Ok(pool)
}
