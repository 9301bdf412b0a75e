//! Cart consolidation and pricing.
//!
//! The cart service owns every cart mutation. Adding a product that is
//! already in the cart increments its line; quantities never drop below one;
//! totals are computed with exact decimal arithmetic on every read.
//!
//! Writes that lose a lock race are retried with exponential backoff and
//! jitter before surfacing as [`CartError::ContentionRetryable`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use shopkeep_core::{
    CartLine, CartLineId, CartView, CartViewError, OrphanedLines, PriceError, ProductId, Quantity,
    QuantityError,
};

use crate::config::StoreConfig;
use crate::db::{CartRepository, RepositoryError};
use crate::services::catalog::CatalogService;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The referenced product is not in the catalog.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The referenced cart line does not exist.
    #[error("cart line {0} not found")]
    LineNotFound(CartLineId),

    /// The quantity is out of range.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Some cart lines reference products that no longer exist.
    #[error("data integrity error: {0}")]
    DataIntegrity(Box<OrphanedLines>),

    /// A line subtotal or the cart total cannot be represented.
    #[error("cart total out of range: {0}")]
    PricingOverflow(#[source] PriceError),

    /// The store failed or returned unreadable data.
    #[error("cart store unavailable: {0}")]
    StoreUnavailable(#[source] RepositoryError),

    /// The store stayed locked through every retry.
    #[error("cart store is busy")]
    ContentionRetryable,
}

impl CartError {
    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ProductNotFound(_) => "product_not_found",
            Self::LineNotFound(_) => "line_not_found",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::DataIntegrity(_) => "data_integrity",
            Self::PricingOverflow(_) => "pricing_overflow",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::ContentionRetryable => "contention_retryable",
        }
    }
}

impl From<RepositoryError> for CartError {
    fn from(err: RepositoryError) -> Self {
        if err.is_retryable() {
            Self::ContentionRetryable
        } else {
            Self::StoreUnavailable(err)
        }
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the first retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), with up to 50% jitter.
    fn delay(&self, retry: u32) -> Duration {
        let base = self
            .backoff
            .saturating_mul(2_u32.saturating_pow(retry.saturating_sub(1)));
        let jitter_ms = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        base.saturating_add(Duration::from_millis(jitter))
    }

    /// Run `op`, retrying while it fails with lock contention.
    async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    let delay = self.delay(attempt);
                    debug!(
                        operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Cart store busy, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Cart store busy, giving up"
                    );
                    return Err(err);
                }
                result => return result,
            }
        }
    }
}

impl From<&StoreConfig> for RetryPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff: config.retry_backoff,
        }
    }
}

/// The single cart of this deployment.
#[derive(Clone)]
pub struct CartService {
    pool: SqlitePool,
    catalog: CatalogService,
    retry: RetryPolicy,
}

impl CartService {
    /// Create a cart service.
    #[must_use]
    pub const fn new(pool: SqlitePool, catalog: CatalogService, retry: RetryPolicy) -> Self {
        Self {
            pool,
            catalog,
            retry,
        }
    }

    /// Add units of a product, consolidating with its existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product is not in the
    /// catalog, or `CartError::InvalidQuantity` if the line would exceed
    /// [`Quantity::MAX`]. Nothing is written on failure.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = %quantity))]
    pub async fn add_or_increment(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, CartError> {
        if self.catalog.get(product_id).await?.is_none() {
            return Err(CartError::ProductNotFound(product_id));
        }

        let repo = CartRepository::new(&self.pool);
        let result = self
            .retry
            .run("add_or_increment", || repo.upsert_increment(product_id, quantity))
            .await;

        match result {
            Ok(line) => {
                debug!(line_id = %line.id, total_quantity = %line.quantity, "Cart line upserted");
                Ok(line)
            }
            Err(RepositoryError::Conflict(_)) => {
                Err(self.explain_conflict(product_id, quantity).await)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Work out why an upsert hit a constraint.
    async fn explain_conflict(&self, product_id: ProductId, quantity: Quantity) -> CartError {
        match CartRepository::new(&self.pool).find_by_product(product_id).await {
            Ok(Some(line)) => CartError::InvalidQuantity(QuantityError::TooLarge {
                max: Quantity::MAX,
                got: i64::from(line.quantity) + i64::from(quantity),
            }),
            Ok(None) => CartError::ProductNotFound(product_id),
            Err(err) => err.into(),
        }
    }

    /// Overwrite the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line does not exist.
    #[instrument(skip(self), fields(line_id = %line_id, quantity = %quantity))]
    pub async fn set_quantity(
        &self,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, CartError> {
        let repo = CartRepository::new(&self.pool);
        self.retry
            .run("set_quantity", || repo.set_quantity(line_id, quantity))
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => CartError::LineNotFound(line_id),
                other => other.into(),
            })
    }

    /// Delete a line. Removing a missing line is not an error.
    ///
    /// # Returns
    ///
    /// Returns `true` if a line was deleted.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StoreUnavailable` or `CartError::ContentionRetryable`
    /// if the store fails.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove(&self, line_id: CartLineId) -> Result<bool, CartError> {
        let repo = CartRepository::new(&self.pool);
        let deleted = self.retry.run("remove", || repo.delete(line_id)).await?;
        debug!(deleted, "Cart line removed");
        Ok(deleted)
    }

    /// Price the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::DataIntegrity` listing every line whose product is
    /// missing, carrying the view of the remaining lines, and
    /// `CartError::PricingOverflow` if the cart cannot be priced.
    #[instrument(skip(self))]
    pub async fn view(&self) -> Result<CartView, CartError> {
        let joined = CartRepository::new(&self.pool).list_joined().await?;
        CartView::build(joined).map_err(|err| match err {
            CartViewError::Orphaned(orphans) => {
                tracing::error!(
                    orphaned_lines = ?orphans.line_ids,
                    "Cart references missing products"
                );
                CartError::DataIntegrity(orphans)
            }
            CartViewError::Pricing(err) => CartError::PricingOverflow(err),
        })
    }

    /// The line holding a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `CartError::StoreUnavailable` if the query fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn find_line_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, CartError> {
        Ok(CartRepository::new(&self.pool)
            .find_by_product(product_id)
            .await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::db::test_support::{product, seeded_pool};

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    const RETRY: RetryPolicy = RetryPolicy {
        attempts: 3,
        backoff: Duration::from_millis(1),
    };

    async fn service() -> (CartService, SqlitePool) {
        let pool = seeded_pool(&[
            product(1, "Headphones", "19.99", "Electronics"),
            product(2, "Socks", "5.00", "Clothing"),
            product(3, "Tent", "100.00", "Outdoors"),
        ])
        .await;
        let catalog = CatalogService::new(pool.clone(), Duration::from_secs(60));
        (CartService::new(pool.clone(), catalog, RETRY), pool)
    }

    #[tokio::test]
    async fn test_add_consolidates_and_remove_empties() {
        let (cart, _pool) = service().await;
        assert!(cart.view().await.unwrap().is_empty());

        let first = cart.add_or_increment(ProductId::new(1), qty(2)).await.unwrap();
        assert_eq!(first.quantity.get(), 2);

        let second = cart.add_or_increment(ProductId::new(1), qty(3)).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.quantity.get(), 5);

        let view = cart.view().await.unwrap();
        assert_eq!(view.line_count, 1);
        assert_eq!(view.item_count, 5);

        assert!(cart.remove(first.id).await.unwrap());
        assert!(cart.view().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_view_totals_are_exact() {
        let (cart, _pool) = service().await;
        cart.add_or_increment(ProductId::new(1), qty(3)).await.unwrap();
        cart.add_or_increment(ProductId::new(2), qty(2)).await.unwrap();
        cart.add_or_increment(ProductId::new(3), qty(1)).await.unwrap();

        let view = cart.view().await.unwrap();
        assert_eq!(view.total.to_string(), "169.97");
        assert_eq!(view.item_count, 6);
        assert_eq!(view.line_count, 3);
    }

    #[tokio::test]
    async fn test_add_unknown_product_mutates_nothing() {
        let (cart, _pool) = service().await;
        let err = cart
            .add_or_increment(ProductId::new(42), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ProductNotFound(id) if id == ProductId::new(42)));
        assert!(cart.view().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_past_max_is_invalid_quantity() {
        let (cart, _pool) = service().await;
        cart.add_or_increment(ProductId::new(1), qty(Quantity::MAX))
            .await
            .unwrap();

        let err = cart
            .add_or_increment(ProductId::new(1), qty(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CartError::InvalidQuantity(QuantityError::TooLarge { .. })
        ));

        let line = cart
            .find_line_by_product(ProductId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.quantity.get(), Quantity::MAX);
    }

    #[tokio::test]
    async fn test_set_quantity_is_exact_and_idempotent() {
        let (cart, _pool) = service().await;
        let line = cart.add_or_increment(ProductId::new(2), qty(1)).await.unwrap();

        cart.set_quantity(line.id, qty(4)).await.unwrap();
        cart.set_quantity(line.id, qty(4)).await.unwrap();

        let view = cart.view().await.unwrap();
        assert_eq!(view.lines[0].quantity.get(), 4);
        assert_eq!(view.total.to_string(), "20.00");
    }

    #[tokio::test]
    async fn test_set_quantity_unknown_line() {
        let (cart, _pool) = service().await;
        let err = cart
            .set_quantity(CartLineId::new(77), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::LineNotFound(id) if id == CartLineId::new(77)));
    }

    #[tokio::test]
    async fn test_remove_twice_succeeds() {
        let (cart, _pool) = service().await;
        let line = cart.add_or_increment(ProductId::new(3), qty(1)).await.unwrap();

        assert!(cart.remove(line.id).await.unwrap());
        assert!(!cart.remove(line.id).await.unwrap());
        assert!(cart.find_line_by_product(ProductId::new(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_view_reports_every_orphan() {
        let (cart, pool) = service().await;
        cart.add_or_increment(ProductId::new(1), qty(1)).await.unwrap();
        let orphan_a = cart.add_or_increment(ProductId::new(2), qty(1)).await.unwrap();
        let orphan_b = cart.add_or_increment(ProductId::new(3), qty(1)).await.unwrap();

        sqlx::query("PRAGMA foreign_keys = OFF").execute(&pool).await.unwrap();
        sqlx::query("DELETE FROM products WHERE id IN (2, 3)")
            .execute(&pool)
            .await
            .unwrap();

        let orphans = match cart.view().await.unwrap_err() {
            CartError::DataIntegrity(orphans) => orphans,
            other => panic!("expected DataIntegrity, got {other:?}"),
        };
        assert_eq!(orphans.line_ids, [orphan_a.id, orphan_b.id]);
        assert_eq!(orphans.partial.total.to_string(), "19.99");
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RETRY
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RepositoryError::Busy("locked".to_string())) }
            })
            .await;

        assert!(matches!(result, Err(RepositoryError::Busy(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            CartError::from(result.unwrap_err()),
            CartError::ContentionRetryable
        ));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_busy() {
        let calls = AtomicU32::new(0);
        let result = RETRY
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RepositoryError::Busy("locked".to_string()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_busy_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RETRY
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RepositoryError::NotFound) }
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_with_bounded_jitter() {
        let policy = RetryPolicy {
            attempts: 5,
            backoff: Duration::from_millis(100),
        };
        for (retry, base) in [(1, 100), (2, 200), (3, 400)] {
            let delay = policy.delay(retry).as_millis();
            assert!(delay >= base && delay <= base + base / 2, "retry {retry}: {delay}ms");
        }
    }
}
