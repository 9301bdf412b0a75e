//! Tool execution against the catalog and cart services.
//!
//! Malformed input is a [`ToolError`] (HTTP 400/404). Domain failures such as
//! an unknown product are successful executions whose result carries
//! `success: false`, so the agent can relay them to the shopper.

use std::time::Instant;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use shopkeep_core::{CartView, ProductId, Quantity};

use crate::db::ProductFilter;
use crate::services::{CartError, CartService, CatalogService};

use super::DEFAULT_LIST_LIMIT;

/// Errors that prevent a tool from running at all.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool has this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The input does not match the tool's schema.
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
}

/// Executor for shopping tools.
pub struct ToolExecutor<'a> {
    catalog: &'a CatalogService,
    cart: &'a CartService,
}

impl<'a> ToolExecutor<'a> {
    /// Create a new tool executor.
    #[must_use]
    pub const fn new(catalog: &'a CatalogService, cart: &'a CartService) -> Self {
        Self { catalog, cart }
    }

    /// Execute a tool and return its result.
    ///
    /// # Errors
    ///
    /// Returns `ToolError::UnknownTool` for an unrecognized name and
    /// `ToolError::InvalidInput` if the input does not match the schema.
    #[instrument(skip(self, input), fields(tool_name = %name))]
    pub async fn execute(&self, name: &str, input: &Value) -> Result<Value, ToolError> {
        let start = Instant::now();

        let result = if input.is_object() || input.is_null() {
            match name {
                "list_products" => self.list_products(input).await,
                "add_to_cart" => self.add_to_cart(input).await,
                "view_cart" => Ok(self.view_cart().await),
                "remove_from_cart" => self.remove_from_cart(input).await,
                _ => Err(ToolError::UnknownTool(name.to_string())),
            }
        } else {
            Err(ToolError::InvalidInput("input must be a JSON object".to_string()))
        };

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(output) => info!(
                success = output["success"].as_bool().unwrap_or(false),
                duration_ms,
                "Tool executed"
            ),
            Err(e) => warn!(error = %e, duration_ms, "Tool rejected"),
        }
        result
    }

    async fn list_products(&self, input: &Value) -> Result<Value, ToolError> {
        let limit = optional_int(input, "limit")?.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 50);
        let filter = ProductFilter {
            category: optional_str(input, "category")?,
            search: optional_str(input, "search_query")?,
            limit: u32::try_from(limit).ok(),
        };

        match self.catalog.list(filter).await {
            Ok(products) => {
                let message = if products.is_empty() {
                    "No products matched.".to_string()
                } else {
                    format!("Found {} product(s).", products.len())
                };
                Ok(json!({
                    "success": true,
                    "count": products.len(),
                    "products": products,
                    "message": message,
                }))
            }
            Err(e) => Ok(failure(&CartError::from(e))),
        }
    }

    async fn add_to_cart(&self, input: &Value) -> Result<Value, ToolError> {
        let product_id = required_id(input, "product_id")?;
        let requested = optional_int(input, "quantity")?.unwrap_or(1);

        let quantity = match Quantity::try_from(requested) {
            Ok(q) => q,
            Err(e) => return Ok(failure(&CartError::InvalidQuantity(e))),
        };

        if let Err(e) = self.cart.add_or_increment(product_id, quantity).await {
            return Ok(failure(&e));
        }

        Ok(match self.cart.view().await {
            Ok(cart) => {
                let message = format!(
                    "Added {quantity} item(s) to your cart. Cart now has {} items totaling {}",
                    cart.item_count,
                    cart.total.display()
                );
                cart_result(&cart, message)
            }
            Err(e) => failure(&e),
        })
    }

    async fn view_cart(&self) -> Value {
        match self.cart.view().await {
            Ok(cart) if cart.is_empty() => {
                cart_result(&cart, "Your shopping cart is empty.".to_string())
            }
            Ok(cart) => {
                let message = format!(
                    "Your cart has {} items ({} products) totaling {}",
                    cart.item_count,
                    cart.line_count,
                    cart.total.display()
                );
                cart_result(&cart, message)
            }
            Err(e) => failure(&e),
        }
    }

    async fn remove_from_cart(&self, input: &Value) -> Result<Value, ToolError> {
        let product_id = required_id(input, "product_id")?;

        let removed = match self.cart.find_line_by_product(product_id).await {
            Ok(Some(line)) => match self.cart.remove(line.id).await {
                Ok(deleted) => deleted,
                Err(e) => return Ok(failure(&e)),
            },
            Ok(None) => false,
            Err(e) => return Ok(failure(&e)),
        };

        let name = match self.catalog.get(product_id).await {
            Ok(Some(product)) => product.name,
            _ => format!("Product {product_id}"),
        };
        let message = if removed {
            format!("Removed {name} from your cart.")
        } else {
            format!("{name} was not in your cart.")
        };

        Ok(match self.cart.view().await {
            Ok(cart) => cart_result(&cart, message),
            Err(e) => failure(&e),
        })
    }
}

fn cart_result(cart: &CartView, message: String) -> Value {
    json!({
        "success": true,
        "cart": cart,
        "message": message,
    })
}

/// A domain failure the agent should relay.
fn failure(err: &CartError) -> Value {
    let message = match err {
        CartError::StoreUnavailable(_)
        | CartError::DataIntegrity(_)
        | CartError::PricingOverflow(_) => {
            error!(error = %err, "Tool failed on cart store");
            "The cart is temporarily unavailable. Please try again.".to_string()
        }
        CartError::ContentionRetryable => {
            "The cart is busy right now. Please try again in a moment.".to_string()
        }
        _ => err.to_string(),
    };
    json!({
        "success": false,
        "error": err.kind(),
        "message": message,
    })
}

/// A required positive id, given as an integer or a numeric string.
fn required_id(input: &Value, field: &str) -> Result<ProductId, ToolError> {
    let id = optional_int(input, field)?
        .ok_or_else(|| ToolError::InvalidInput(format!("Missing required field: {field}")))?;
    if id < 1 {
        return Err(ToolError::InvalidInput(format!(
            "{field} must be a positive integer (got {id})"
        )));
    }
    Ok(ProductId::new(id))
}

fn optional_int(input: &Value, field: &str) -> Result<Option<i64>, ToolError> {
    match &input[field] {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| ToolError::InvalidInput(format!("{field} must be an integer"))),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ToolError::InvalidInput(format!("{field} must be an integer"))),
        _ => Err(ToolError::InvalidInput(format!("{field} must be an integer"))),
    }
}

fn optional_str(input: &Value, field: &str) -> Result<Option<String>, ToolError> {
    match &input[field] {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(ToolError::InvalidInput(format!("{field} must be a string"))),
    }
}
