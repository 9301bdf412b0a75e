//! Seed the product catalog from a YAML file.
//!
//! The file is parsed and validated in full before the database is opened,
//! and its products are inserted in a single transaction, so a bad file never
//! leaves a half-seeded catalog behind. Products whose id already exists are
//! skipped, which makes reseeding safe.
//!
//! ```yaml
//! products:
//!   - id: 1
//!     name: Wireless Headphones
//!     price: "79.99"
//!     description: Over-ear Bluetooth headphones
//!     category: Electronics
//!     emoji: "🎧"
//! ```

use std::path::Path;
use std::time::Duration;

use tracing::info;

use shopkeep_api::db::ProductRepository;
use shopkeep_api::services::{CatalogService, SeedFile};

/// Catalog cache TTL for one-shot commands.
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Seed products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, or if
/// database operations fail.
pub async fn products(file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !file_path.exists() {
        return Err(format!("File not found: {}", file_path.display()).into());
    }

    info!(path = %file_path.display(), "Loading products from file");

    // Read and validate YAML before connecting to database
    let seed = SeedFile::load(file_path).await?;
    info!(products = seed.products.len(), "Seed file validated");

    let pool = super::connect().await?;
    shopkeep_api::db::run_migrations(&pool).await?;

    let catalog = CatalogService::new(pool.clone(), CACHE_TTL);
    let report = catalog.seed(&seed).await?;

    info!("Seeding complete!");
    info!("  Products inserted: {}", report.inserted);
    info!("  Products skipped (already exist): {}", report.skipped);

    let total = ProductRepository::new(&pool).count().await?;
    info!("  Catalog size: {total}");

    pool.close().await;
    Ok(())
}
