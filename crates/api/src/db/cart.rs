//! Cart line repository.
//!
//! Every mutation is a single SQL statement, so concurrent requests never
//! lose an update: adding a product already in the cart increments the
//! existing row in place via `ON CONFLICT (product_id) DO UPDATE`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use shopkeep_core::{CartLine, CartLineId, Price, Product, ProductId, Quantity};

use super::RepositoryError;

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    product_id: ProductId,
    quantity: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(row.quantity).map_err(|e| {
            let message = format!("invalid quantity on cart line {}: {e}", row.id);
            RepositoryError::DataCorruption(message)
        })?;
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            quantity,
            updated_at: row.updated_at,
        })
    }
}

/// A cart line left-joined with its product.
#[derive(sqlx::FromRow)]
struct JoinedRow {
    id: CartLineId,
    product_id: ProductId,
    quantity: i64,
    updated_at: DateTime<Utc>,
    joined_id: Option<ProductId>,
    name: Option<String>,
    price: Option<String>,
    description: Option<String>,
    category: Option<String>,
    emoji: Option<String>,
}

impl JoinedRow {
    fn split(self) -> Result<(CartLine, Option<Product>), RepositoryError> {
        let product = match (self.joined_id, self.name, self.price, self.emoji) {
            (Some(id), Some(name), Some(price), Some(emoji)) => {
                let price: Price = price.parse().map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid price for product {id}: {e}"))
                })?;
                Some(Product {
                    id,
                    name,
                    price,
                    description: self.description.unwrap_or_default(),
                    category: self.category.unwrap_or_default(),
                    emoji,
                })
            }
            _ => None,
        };

        let line = CartLine::try_from(CartLineRow {
            id: self.id,
            product_id: self.product_id,
            quantity: self.quantity,
            updated_at: self.updated_at,
        })?;
        Ok((line, product))
    }
}

/// Repository for cart line database operations.
pub struct CartRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Add `quantity` units of a product, creating the line or incrementing it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product does not exist or the
    /// new quantity would exceed the allowed maximum.
    /// Returns `RepositoryError::Busy` if the database stayed locked.
    pub async fn upsert_increment(
        &self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let row: CartLineRow = sqlx::query_as(
            r"
            INSERT INTO cart_lines (product_id, quantity)
            VALUES (?, ?)
            ON CONFLICT (product_id) DO UPDATE SET
                quantity = cart_lines.quantity + excluded.quantity,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            RETURNING id, product_id, quantity, updated_at
            ",
        )
        .bind(product_id)
        .bind(i64::from(quantity))
        .fetch_one(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;

        row.try_into()
    }

    /// Replace the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    /// Returns `RepositoryError::Busy` if the database stayed locked.
    pub async fn set_quantity(
        &self,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let row: Option<CartLineRow> = sqlx::query_as(
            r"
            UPDATE cart_lines
            SET quantity = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE id = ?
            RETURNING id, product_id, quantity, updated_at
            ",
        )
        .bind(i64::from(quantity))
        .bind(line_id)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from_write)?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a line.
    ///
    /// # Returns
    ///
    /// Returns `true` if a line was deleted, `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Busy` if the database stayed locked.
    pub async fn delete(&self, line_id: CartLineId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE id = ?")
            .bind(line_id)
            .execute(self.pool)
            .await
            .map_err(RepositoryError::from_write)?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the line holding a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let row: Option<CartLineRow> = sqlx::query_as(
            "SELECT id, product_id, quantity, updated_at FROM cart_lines WHERE product_id = ?",
        )
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartLine::try_from).transpose()
    }

    /// Every line in creation order, each paired with its product if it
    /// still exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored row is invalid.
    pub async fn list_joined(&self) -> Result<Vec<(CartLine, Option<Product>)>, RepositoryError> {
        let rows: Vec<JoinedRow> = sqlx::query_as(
            r"
            SELECT
                c.id, c.product_id, c.quantity, c.updated_at,
                p.id AS joined_id, p.name, p.price, p.description, p.category, p.emoji
            FROM cart_lines c
            LEFT JOIN products p ON p.id = c.product_id
            ORDER BY c.id ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(JoinedRow::split).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;
    use crate::db::test_support::{product, seeded_pool};
    use crate::db::{ProductRepository, create_pool, run_migrations};

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    async fn pool() -> SqlitePool {
        seeded_pool(&[
            product(1, "Headphones", "19.99", "Electronics"),
            product(2, "Socks", "5.00", "Clothing"),
        ])
        .await
    }

    #[tokio::test]
    async fn test_upsert_creates_then_increments_same_line() {
        let pool = pool().await;
        let repo = CartRepository::new(&pool);

        let first = repo.upsert_increment(ProductId::new(1), qty(2)).await.unwrap();
        let second = repo.upsert_increment(ProductId::new(1), qty(3)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity.get(), 5);
        assert_eq!(repo.list_joined().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_unknown_product_is_conflict() {
        let pool = pool().await;
        let err = CartRepository::new(&pool)
            .upsert_increment(ProductId::new(99), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_upsert_past_max_is_conflict_and_leaves_line() {
        let pool = pool().await;
        let repo = CartRepository::new(&pool);
        repo.upsert_increment(ProductId::new(1), qty(Quantity::MAX))
            .await
            .unwrap();

        let err = repo
            .upsert_increment(ProductId::new(1), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let line = repo.find_by_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(line.quantity.get(), Quantity::MAX);
    }

    #[tokio::test]
    async fn test_set_quantity_and_missing_line() {
        let pool = pool().await;
        let repo = CartRepository::new(&pool);
        let line = repo.upsert_increment(ProductId::new(2), qty(1)).await.unwrap();

        let updated = repo.set_quantity(line.id, qty(7)).await.unwrap();
        assert_eq!(updated.quantity.get(), 7);
        assert_eq!(updated.id, line.id);

        let err = repo
            .set_quantity(CartLineId::new(999), qty(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let pool = pool().await;
        let repo = CartRepository::new(&pool);
        let line = repo.upsert_increment(ProductId::new(1), qty(1)).await.unwrap();

        assert!(repo.delete(line.id).await.unwrap());
        assert!(!repo.delete(line.id).await.unwrap());
        assert!(repo.find_by_product(ProductId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_joined_in_creation_order_with_products() {
        let pool = pool().await;
        let repo = CartRepository::new(&pool);
        repo.upsert_increment(ProductId::new(2), qty(1)).await.unwrap();
        repo.upsert_increment(ProductId::new(1), qty(1)).await.unwrap();
        repo.upsert_increment(ProductId::new(2), qty(4)).await.unwrap();

        let joined = repo.list_joined().await.unwrap();
        let order: Vec<i64> = joined.iter().map(|(l, _)| l.product_id.as_i64()).collect();
        assert_eq!(order, [2, 1]);
        assert_eq!(joined[0].0.quantity.get(), 5);
        assert_eq!(
            joined[1].1.as_ref().map(|p| p.price.to_string()).as_deref(),
            Some("19.99")
        );
    }

    #[tokio::test]
    async fn test_list_joined_reports_missing_product_as_none() {
        let pool = pool().await;
        let repo = CartRepository::new(&pool);
        repo.upsert_increment(ProductId::new(1), qty(1)).await.unwrap();

        // Simulate out-of-band catalog damage
        sqlx::query("PRAGMA foreign_keys = OFF").execute(&pool).await.unwrap();
        sqlx::query("DELETE FROM products WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();

        let joined = repo.list_joined().await.unwrap();
        assert_eq!(joined.len(), 1);
        assert!(joined[0].1.is_none());
    }

    #[tokio::test]
    async fn test_catalog_delete_is_restricted_by_cart() {
        let pool = pool().await;
        CartRepository::new(&pool)
            .upsert_increment(ProductId::new(1), qty(1))
            .await
            .unwrap();

        let result = sqlx::query("DELETE FROM products WHERE id = 1")
            .execute(&pool)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("cart.db").display());
        let pool = create_pool(&SecretString::from(url), Duration::from_secs(10))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        ProductRepository::new(&pool)
            .insert_all(&[product(1, "Headphones", "19.99", "Electronics")])
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                CartRepository::new(&pool)
                    .upsert_increment(ProductId::new(1), Quantity::ONE)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let joined = CartRepository::new(&pool).list_joined().await.unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].0.quantity.get(), 25);
    }
}
