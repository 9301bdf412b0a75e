//! Catalog reads and seeding.
//!
//! Products never change while the server runs, so lookups by id are cached
//! with `moka`. Listings go straight to the database since every filter
//! combination would be its own cache entry.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, instrument};

use shopkeep_core::{Product, ProductId};

use crate::db::{ProductFilter, ProductRepository, RepositoryError};

/// Errors that can occur while loading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The seed file could not be read.
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    /// The seed file is not valid YAML for a product list.
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A product failed validation.
    #[error("invalid product {id}: {reason}")]
    InvalidProduct { id: ProductId, reason: String },

    /// Two products share an id.
    #[error("duplicate product id {0}")]
    DuplicateId(ProductId),
}

/// Seed file layout.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products: Vec<Product>,
}

impl SeedFile {
    /// Parse and validate a seed document.
    ///
    /// # Errors
    ///
    /// Returns `SeedError` if the YAML is malformed, a product is invalid,
    /// or an id appears twice.
    pub fn parse(yaml: &str) -> Result<Self, SeedError> {
        let file: Self = serde_yaml::from_str(yaml)?;

        let mut seen = HashSet::new();
        for product in &file.products {
            product
                .validate()
                .map_err(|e| SeedError::InvalidProduct {
                    id: product.id,
                    reason: e.to_string(),
                })?;
            if !seen.insert(product.id) {
                return Err(SeedError::DuplicateId(product.id));
            }
        }

        Ok(file)
    }

    /// Read, parse and validate a seed file from disk.
    ///
    /// # Errors
    ///
    /// Returns `SeedError` if the file cannot be read or fails validation.
    pub async fn load(path: &Path) -> Result<Self, SeedError> {
        let yaml = tokio::fs::read_to_string(path).await?;
        Self::parse(&yaml)
    }
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Products newly inserted.
    pub inserted: usize,
    /// Products whose id already existed.
    pub skipped: usize,
}

/// Read access to the product catalog.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogServiceInner>,
}

struct CatalogServiceInner {
    pool: SqlitePool,
    cache: Cache<ProductId, Product>,
}

impl CatalogService {
    /// Create a catalog service caching products for `ttl`.
    #[must_use]
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self {
            inner: Arc::new(CatalogServiceInner { pool, cache }),
        }
    }

    /// List products matching a filter, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let filter = filter.normalized();
        ProductRepository::new(&self.inner.pool).list(&filter).await
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.inner.cache.get(&id).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let product = ProductRepository::new(&self.inner.pool).get(id).await?;
        if let Some(product) = &product {
            self.inner.cache.insert(id, product.clone()).await;
        }
        Ok(product)
    }

    /// Insert seed products, leaving existing ids untouched.
    ///
    /// The whole file is inserted in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if an insert fails, in which case nothing
    /// from the file is inserted.
    #[instrument(skip(self, seed), fields(products = seed.products.len()))]
    pub async fn seed(&self, seed: &SeedFile) -> Result<SeedReport, RepositoryError> {
        let inserted = ProductRepository::new(&self.inner.pool)
            .insert_all(&seed.products)
            .await?;
        let report = SeedReport {
            inserted,
            skipped: seed.products.len() - inserted,
        };

        self.invalidate_all().await;
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Catalog seeded"
        );
        Ok(report)
    }

    /// Drop every cached product.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}
