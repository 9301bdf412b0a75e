//! Cart request bodies and responses.

use serde::{Deserialize, Serialize};

use shopkeep_core::{CartLine, CartLineId, ProductId, Quantity};

use crate::extract::{Validate, ValidationError, positive_id};

/// `POST /cart` body.
#[derive(Debug, Deserialize)]
pub struct AddToCartBody {
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
}

/// Validated add command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl Validate for AddToCartBody {
    type Output = AddToCart;

    fn validate(self) -> Result<AddToCart, ValidationError> {
        let product_id = positive_id("product_id", self.product_id)?;
        let quantity = self
            .quantity
            .ok_or(ValidationError::MissingField("quantity"))?;
        Ok(AddToCart {
            product_id: ProductId::new(product_id),
            quantity: Quantity::try_from(quantity)?,
        })
    }
}

/// `PUT /cart/{line_id}` body.
#[derive(Debug, Deserialize)]
pub struct SetQuantityBody {
    pub quantity: Option<i64>,
}

impl Validate for SetQuantityBody {
    type Output = Quantity;

    fn validate(self) -> Result<Quantity, ValidationError> {
        let quantity = self
            .quantity
            .ok_or(ValidationError::MissingField("quantity"))?;
        Ok(Quantity::try_from(quantity)?)
    }
}

/// A mutated cart line with a human-readable confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineResponse {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub message: String,
}

impl CartLineResponse {
    #[must_use]
    pub fn new(line: &CartLine, message: impl Into<String>) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            quantity: line.quantity,
            message: message.into(),
        }
    }
}

/// Confirmation without a line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
