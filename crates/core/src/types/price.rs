//! Type-safe price representation using decimal arithmetic.
//!
//! All catalog prices and cart totals are [`Price`] values: non-negative
//! amounts in USD major units, always carried at exactly two decimal places.
//! Arithmetic happens on [`Decimal`] so summing many lines never drifts the
//! way `f64` would, and every operation is checked: an overflow is a
//! [`PriceError::Overflow`], never a panic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quantity::Quantity;

/// Number of fractional digits carried by every price.
pub const CURRENCY_SCALE: u32 = 2;

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),
    /// The amount has more fractional digits than the currency allows.
    #[error("price must have at most 2 decimal places (got {0})")]
    TooPrecise(Decimal),
    /// The amount is above [`Price::MAX`].
    #[error("price must be at most {max} (got {0})", max = Price::MAX)]
    TooLarge(Decimal),
    /// A subtotal or total does not fit the decimal range at two places.
    #[error("amount is out of range")]
    Overflow,
    /// The input could not be parsed as a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),
}

/// A non-negative amount of money with two-decimal semantics.
///
/// Serializes as a decimal string (`"19.99"`) so JSON consumers never see a
/// binary float.
///
/// Parsed and deserialized amounts are bounded by [`Price::MAX`]. Subtotals
/// and totals computed from them may exceed it.
///
/// ```
/// use shopkeep_core::{Price, Quantity};
///
/// let price: Price = "19.99".parse().unwrap();
/// let qty = Quantity::new(3).unwrap();
/// assert_eq!(price.times(qty).unwrap().to_string(), "59.97");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price {
    amount: Decimal,
}

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self {
        amount: Decimal::from_parts(0, 0, 0, false, CURRENCY_SCALE),
    };

    /// The largest unit price accepted: 999999999.99.
    pub const MAX: Self = Self {
        amount: Decimal::from_parts(1_215_752_191, 23, 0, false, CURRENCY_SCALE),
    };

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for amounts below zero,
    /// [`PriceError::TooLarge`] for amounts above [`Price::MAX`] and
    /// [`PriceError::TooPrecise`] for amounts with more than two significant
    /// fractional digits.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        if amount > Self::MAX.amount {
            return Err(PriceError::TooLarge(amount));
        }
        let normalized = amount.normalize();
        if normalized.scale() > CURRENCY_SCALE {
            return Err(PriceError::TooPrecise(amount));
        }
        let mut amount = normalized;
        amount.rescale(CURRENCY_SCALE);
        // -0.00 compares equal to 0.00 but prints with a sign
        amount.set_sign_positive(true);
        Ok(Self { amount })
    }

    /// The underlying decimal amount (always scale 2).
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// Line subtotal: this unit price multiplied by a quantity.
    ///
    /// Exact; the product of two-decimal price and an integer quantity never
    /// needs rounding.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the product is out of range.
    pub fn times(self, quantity: Quantity) -> Result<Self, PriceError> {
        self.amount
            .checked_mul(Decimal::from(quantity.get()))
            .ok_or(PriceError::Overflow)
            .and_then(Self::at_currency_scale)
    }

    /// Add two amounts.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the sum is out of range.
    pub fn checked_add(self, other: Self) -> Result<Self, PriceError> {
        self.amount
            .checked_add(other.amount)
            .ok_or(PriceError::Overflow)
            .and_then(Self::at_currency_scale)
    }

    /// Sum amounts, starting from zero.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the running total goes out of range.
    pub fn total<I>(amounts: I) -> Result<Self, PriceError>
    where
        I: IntoIterator<Item = Self>,
    {
        amounts.into_iter().try_fold(Self::ZERO, Self::checked_add)
    }

    /// Wrap an amount without any checks.
    #[cfg(test)]
    pub(crate) const fn unchecked(amount: Decimal) -> Self {
        Self { amount }
    }

    /// Carry a computed amount at exactly two decimals.
    fn at_currency_scale(mut amount: Decimal) -> Result<Self, PriceError> {
        amount.rescale(CURRENCY_SCALE);
        // Values near the top of the range cannot hold two fractional digits
        if amount.scale() == CURRENCY_SCALE {
            Ok(Self { amount })
        } else {
            Err(PriceError::Overflow)
        }
    }

    /// Format for display (e.g., "$19.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("${}", self.amount)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.amount)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|e| PriceError::Invalid(e.to_string()))?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.amount
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn price(s: &str) -> Price {
        s.parse().unwrap()
    }

    #[test]
    fn test_price_is_carried_at_two_decimals() {
        assert_eq!(price("100").to_string(), "100.00");
        assert_eq!(price("5.5").to_string(), "5.50");
        assert_eq!(price("19.990").to_string(), "19.99");
    }

    #[test]
    fn test_price_rejects_negative() {
        assert!(matches!(
            "-0.01".parse::<Price>(),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        assert_eq!(price("-0").to_string(), "0.00");
    }

    #[test]
    fn test_price_rejects_sub_cent_precision() {
        assert!(matches!(
            "1.999".parse::<Price>(),
            Err(PriceError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_price_rejects_garbage() {
        assert!(matches!("abc".parse::<Price>(), Err(PriceError::Invalid(_))));
    }

    #[test]
    fn test_price_rejects_amounts_above_max() {
        assert_eq!(Price::MAX.to_string(), "999999999.99");
        assert_eq!(price("999999999.99"), Price::MAX);
        assert!(matches!(
            "1000000000.00".parse::<Price>(),
            Err(PriceError::TooLarge(_))
        ));
        assert!(matches!(
            "100000000000000000000".parse::<Price>(),
            Err(PriceError::TooLarge(_))
        ));
    }

    #[test]
    fn test_times_is_exact() {
        let qty = Quantity::new(3).unwrap();
        assert_eq!(price("19.99").times(qty).unwrap(), price("59.97"));
    }

    #[test]
    fn test_largest_subtotal_keeps_two_decimals() {
        let qty = Quantity::new(Quantity::MAX).unwrap();
        let subtotal = Price::MAX.times(qty).unwrap();
        assert_eq!(subtotal.to_string(), "2147483646978525163.53");
    }

    #[test]
    fn test_overflow_is_an_error() {
        let huge = Price {
            amount: Decimal::MAX,
        };
        assert_eq!(huge.times(Quantity::new(2).unwrap()), Err(PriceError::Overflow));
        assert_eq!(huge.checked_add(Price::MAX), Err(PriceError::Overflow));
        // Fits the decimal range but not at two fractional digits
        let wide = Price {
            amount: Decimal::from_i128_with_scale(10_i128.pow(27), 0),
        };
        assert_eq!(wide.checked_add(Price::ZERO), Err(PriceError::Overflow));
    }

    #[test]
    fn test_total_has_no_float_drift() {
        // 0.1 + 0.2 != 0.3 in binary floating point
        let total = Price::total([price("0.10"), price("0.20")]).unwrap();
        assert_eq!(total, price("0.30"));

        let many = Price::total(std::iter::repeat_n(price("0.01"), 10_000)).unwrap();
        assert_eq!(many, price("100.00"));
    }

    #[test]
    fn test_empty_total_is_zero() {
        let total = Price::total(std::iter::empty()).unwrap();
        assert_eq!(total, Price::ZERO);
        assert_eq!(total.to_string(), "0.00");
    }

    #[test]
    fn test_display() {
        assert_eq!(price("169.97").display(), "$169.97");
    }

    #[test]
    fn test_serde_uses_decimal_strings() {
        let json = serde_json::to_string(&price("5")).unwrap();
        assert_eq!(json, "\"5.00\"");

        let parsed: Price = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(parsed, price("19.99"));

        assert!(serde_json::from_str::<Price>("\"-1.00\"").is_err());
    }
}
