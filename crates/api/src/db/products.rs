//! Product repository for catalog reads and seeding.
//!
//! Prices are stored as decimal text and parsed back into [`Price`] on read;
//! a row that fails to parse is reported as data corruption rather than
//! silently coerced.

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use shopkeep_core::{Price, Product, ProductId};

use super::RepositoryError;

/// Largest page a catalog listing returns.
pub const MAX_LIMIT: u32 = 50;

/// Catalog listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductFilter {
    /// Exact category, case-insensitive.
    pub category: Option<String>,
    /// Substring of name, description or category, case-insensitive.
    pub search: Option<String>,
    /// Maximum number of products, clamped to `1..=MAX_LIMIT`.
    pub limit: Option<u32>,
}

impl ProductFilter {
    /// Drop blank terms and clamp the limit.
    #[must_use]
    pub fn normalized(self) -> Self {
        let non_blank = |s: Option<String>| {
            s.map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        Self {
            category: non_blank(self.category),
            search: non_blank(self.search),
            limit: self.limit.map(|l| l.clamp(1, MAX_LIMIT)),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    price: String,
    description: String,
    category: String,
    emoji: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price: Price = row.price.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price for product {}: {e}", row.id))
        })?;

        let product = Self {
            id: row.id,
            name: row.name,
            price,
            description: row.description,
            category: row.category,
            emoji: row.emoji,
        };
        product.validate().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product {}: {e}", product.id))
        })?;
        Ok(product)
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List products ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored product is invalid.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, name, price, description, category, emoji FROM products WHERE 1 = 1",
        );

        if let Some(category) = &filter.category {
            query.push(" AND category = ").push_bind(category.clone());
            query.push(" COLLATE NOCASE");
        }

        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            query.push(" AND (name LIKE ");
            query.push_bind(pattern.clone()).push(" ESCAPE '\\'");
            query.push(" OR description LIKE ");
            query.push_bind(pattern.clone()).push(" ESCAPE '\\'");
            query.push(" OR category LIKE ");
            query.push_bind(pattern).push(" ESCAPE '\\')");
        }

        query.push(" ORDER BY id ASC");

        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored product is invalid.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(
            r"
            SELECT id, name, price, description, category, emoji
            FROM products
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    /// Insert products in one transaction, skipping IDs that already exist.
    ///
    /// Catalog rows are immutable: an existing ID is left untouched. Either
    /// every new product is inserted or none is.
    ///
    /// # Returns
    ///
    /// The number of products actually inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a row violates a constraint.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert_all(&self, products: &[Product]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from_write)?;
        let mut inserted = 0;

        for product in products {
            let result = sqlx::query(
                r"
                INSERT INTO products (id, name, price, description, category, emoji)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (id) DO NOTHING
                ",
            )
            .bind(product.id)
            .bind(&product.name)
            .bind(product.price.to_string())
            .bind(&product.description)
            .bind(&product.category)
            .bind(&product.emoji)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from_write)?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tx.commit().await.map_err(RepositoryError::from_write)?;
        Ok(inserted)
    }

    /// Count catalog products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
