//! Catalog listing command.

use std::time::Duration;

use tracing::info;

use shopkeep_api::db::ProductFilter;
use shopkeep_api::services::CatalogService;

/// Catalog cache TTL for one-shot commands.
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Log every product matching `filter`.
///
/// # Errors
///
/// Returns an error if the database cannot be read.
pub async fn list(filter: ProductFilter) -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    let catalog = CatalogService::new(pool.clone(), CACHE_TTL);

    let products = catalog.list(filter).await?;
    if products.is_empty() {
        info!("No products found. Run `shopkeep seed` to load the demo catalog.");
    }

    for product in &products {
        info!(
            "{:>4}  {}  {:<24} {:>10}  {}",
            product.id.as_i64(),
            product.emoji,
            product.name,
            product.price.display(),
            product.category
        );
    }
    info!(count = products.len(), "Catalog listed");

    pool.close().await;
    Ok(())
}
