//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! shopkeep migrate
//! ```
//!
//! Migrations live in `crates/api/migrations/` and are embedded in the
//! binary, so the command works from any directory. The database file is
//! created if it does not exist.

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    shopkeep_api::db::run_migrations(&pool).await?;

    let applied = shopkeep_api::db::MIGRATOR.iter().count();
    tracing::info!(migrations = applied, "Migrations complete!");

    pool.close().await;
    Ok(())
}
