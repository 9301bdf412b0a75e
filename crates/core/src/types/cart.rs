//! Cart lines and the derived cart view.
//!
//! A [`CartLine`] is what the cart store persists: a product reference and a
//! quantity. A [`CartView`] is never stored; it is rebuilt on every read by
//! joining lines with their products and pricing them.
//!
//! # Counting
//!
//! `item_count` is the total number of units (Σ quantity), matching what a
//! cart badge shows. `line_count` is the number of distinct lines.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{CartLineId, ProductId};
use super::price::{Price, PriceError};
use super::product::Product;
use super::quantity::Quantity;

/// A persisted cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Line identifier, assigned when the product is first added.
    pub id: CartLineId,
    /// The product this line holds.
    pub product_id: ProductId,
    /// Number of units, always at least one.
    pub quantity: Quantity,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with its product and priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartViewLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub name: String,
    pub price: Price,
    pub description: String,
    pub category: String,
    pub emoji: String,
    /// `price * quantity`.
    pub subtotal: Price,
}

impl CartViewLine {
    /// Join a line with its product.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the subtotal is out of range.
    pub fn new(line: &CartLine, product: &Product) -> Result<Self, PriceError> {
        Ok(Self {
            id: line.id,
            product_id: line.product_id,
            quantity: line.quantity,
            name: product.name.clone(),
            price: product.price,
            description: product.description.clone(),
            category: product.category.clone(),
            emoji: product.emoji.clone(),
            subtotal: product.price.times(line.quantity)?,
        })
    }
}

/// The priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    /// Lines in creation order.
    pub lines: Vec<CartViewLine>,
    /// Σ subtotal.
    pub total: Price,
    /// Σ quantity.
    pub item_count: u64,
    /// Number of distinct lines.
    pub line_count: usize,
}

impl Default for CartView {
    fn default() -> Self {
        Self::empty()
    }
}

/// Cart lines whose product no longer exists.
///
/// Carries the view of the intact lines so callers can decide whether to
/// show a partial cart or fail outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedLines {
    /// Every line whose product is missing, in creation order.
    pub line_ids: Vec<CartLineId>,
    /// The cart priced without the orphaned lines.
    pub partial: CartView,
}

impl fmt::Display for OrphanedLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cart lines reference missing products:")?;
        for id in &self.line_ids {
            write!(f, " {id}")?;
        }
        Ok(())
    }
}

impl std::error::Error for OrphanedLines {}

/// Reasons a cart cannot be priced.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartViewError {
    /// Some lines reference products that no longer exist.
    #[error(transparent)]
    Orphaned(Box<OrphanedLines>),
    /// A subtotal or the total is out of range.
    #[error("cart total out of range: {0}")]
    Pricing(#[from] PriceError),
}

impl CartView {
    /// An empty cart: no lines, zero total.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lines: Vec::new(),
            total: Price::ZERO,
            item_count: 0,
            line_count: 0,
        }
    }

    /// Build a view from already-joined lines.
    ///
    /// Line order is preserved as given.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the total is out of range.
    pub fn from_lines(lines: Vec<CartViewLine>) -> Result<Self, PriceError> {
        let total = Price::total(lines.iter().map(|l| l.subtotal))?;
        let item_count = lines.iter().map(|l| u64::from(l.quantity.get())).sum();
        let line_count = lines.len();
        Ok(Self {
            lines,
            total,
            item_count,
            line_count,
        })
    }

    /// Join lines with their products and price them.
    ///
    /// Each entry pairs a line with the product it references, or `None` if the
    /// product is missing.
    ///
    /// # Errors
    ///
    /// Returns [`CartViewError::Orphaned`] listing every line without a
    /// product; the remaining lines are still priced and returned inside the
    /// error. Returns [`CartViewError::Pricing`] if a subtotal or the total is
    /// out of range.
    pub fn build<I>(joined: I) -> Result<Self, CartViewError>
    where
        I: IntoIterator<Item = (CartLine, Option<Product>)>,
    {
        let mut lines = Vec::new();
        let mut orphans = Vec::new();

        for (line, product) in joined {
            match product {
                Some(product) => lines.push(CartViewLine::new(&line, &product)?),
                None => orphans.push(line.id),
            }
        }

        let view = Self::from_lines(lines)?;
        if orphans.is_empty() {
            Ok(view)
        } else {
            Err(CartViewError::Orphaned(Box::new(OrphanedLines {
                line_ids: orphans,
                partial: view,
            })))
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i64, price: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: price.parse().unwrap(),
            description: String::new(),
            category: "Test".to_string(),
            emoji: "📦".to_string(),
        }
    }

    fn line(id: i64, product_id: i64, quantity: u32) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            product_id: ProductId::new(product_id),
            quantity: Quantity::new(quantity).unwrap(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_cart() {
        let view = CartView::build(Vec::new()).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.total, Price::ZERO);
        assert_eq!(view.item_count, 0);
        assert_eq!(view.line_count, 0);
    }

    #[test]
    fn test_total_is_exact_sum_of_subtotals() {
        let view = CartView::build(vec![
            (line(1, 1, 3), Some(product(1, "19.99"))),
            (line(2, 2, 2), Some(product(2, "5.00"))),
            (line(3, 3, 1), Some(product(3, "100.00"))),
        ])
        .unwrap();

        let subtotals: Vec<String> = view.lines.iter().map(|l| l.subtotal.to_string()).collect();
        assert_eq!(subtotals, ["59.97", "10.00", "100.00"]);
        assert_eq!(view.total.to_string(), "169.97");
        assert_eq!(view.item_count, 6);
        assert_eq!(view.line_count, 3);
    }

    #[test]
    fn test_line_order_is_preserved() {
        let view = CartView::build(vec![
            (line(9, 2, 1), Some(product(2, "1.00"))),
            (line(4, 1, 1), Some(product(1, "1.00"))),
        ])
        .unwrap();

        let ids: Vec<i64> = view.lines.iter().map(|l| l.id.as_i64()).collect();
        assert_eq!(ids, [9, 4]);
    }

    #[test]
    fn test_orphans_are_all_reported_with_partial_view() {
        let err = CartView::build(vec![
            (line(1, 1, 2), Some(product(1, "2.50"))),
            (line(2, 404, 1), None),
            (line(3, 405, 7), None),
        ])
        .unwrap_err();

        assert_eq!(err.to_string(), "cart lines reference missing products: 2 3");
        let CartViewError::Orphaned(orphans) = &err else {
            panic!("expected orphaned lines, got {err:?}");
        };
        assert_eq!(orphans.line_ids, [CartLineId::new(2), CartLineId::new(3)]);
        assert_eq!(orphans.partial.line_count, 1);
        assert_eq!(orphans.partial.total.to_string(), "5.00");
    }

    #[test]
    fn test_item_count_does_not_overflow_u32() {
        let view = CartView::build(vec![
            (line(1, 1, Quantity::MAX), Some(product(1, "0.00"))),
            (line(2, 2, Quantity::MAX), Some(product(2, "0.00"))),
            (line(3, 3, Quantity::MAX), Some(product(3, "0.00"))),
        ])
        .unwrap();
        assert_eq!(view.item_count, 3 * u64::from(Quantity::MAX));
    }

    #[test]
    fn test_most_expensive_cart_prices_without_overflow() {
        let max = Price::MAX.to_string();
        let view = CartView::build(vec![
            (line(1, 1, Quantity::MAX), Some(product(1, &max))),
            (line(2, 2, Quantity::MAX), Some(product(2, &max))),
        ])
        .unwrap();

        let first = view.lines.first().unwrap();
        assert_eq!(first.subtotal.to_string(), "2147483646978525163.53");
        assert_eq!(view.total.to_string(), "4294967293957050327.06");
    }

    #[test]
    fn test_out_of_range_subtotal_is_an_error() {
        let mut product = product(1, "1.00");
        product.price = Price::unchecked(Decimal::MAX);
        let err = CartView::build(vec![(line(1, 1, 2), Some(product))]).unwrap_err();
        assert_eq!(err, CartViewError::Pricing(PriceError::Overflow));
    }

    #[test]
    fn test_out_of_range_total_is_an_error() {
        // Each subtotal fits at two decimals; their sum does not
        let half = Price::unchecked(Decimal::from_i128_with_scale(5 * 10_i128.pow(28), 2));
        let (mut first, mut second) = (product(1, "1.00"), product(2, "1.00"));
        first.price = half;
        second.price = half;
        let lines = vec![(line(1, 1, 1), Some(first)), (line(2, 2, 1), Some(second))];
        let err = CartView::build(lines).unwrap_err();
        assert_eq!(err, CartViewError::Pricing(PriceError::Overflow));
    }
}
