//! Catalog product.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Reasons a product record is not acceptable for the catalog.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// IDs start at 1.
    #[error("product id must be positive (got {0})")]
    InvalidId(ProductId),
    /// Name is empty or whitespace.
    #[error("product name cannot be empty")]
    EmptyName,
    /// Emoji image marker is empty or whitespace.
    #[error("product emoji cannot be empty")]
    EmptyEmoji,
}

/// A product in the catalog.
///
/// Products are immutable once seeded; the cart only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Stable, never-reused identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub price: Price,
    /// Free-form description, may be empty.
    #[serde(default)]
    pub description: String,
    /// Category label, may be empty.
    #[serde(default)]
    pub category: String,
    /// Emoji standing in for a product image.
    pub emoji: String,
}

impl Product {
    /// Check the catalog invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.id.as_i64() < 1 {
            return Err(ProductError::InvalidId(self.id));
        }
        if self.name.trim().is_empty() {
            return Err(ProductError::EmptyName);
        }
        if self.emoji.trim().is_empty() {
            return Err(ProductError::EmptyEmoji);
        }
        Ok(())
    }
}
