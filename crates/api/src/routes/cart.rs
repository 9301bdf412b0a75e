//! Cart route handlers.
//!
//! Every mutation is validated at the boundary by [`ValidatedJson`] and then
//! delegated to the cart service. Breadcrumbs record the trail of cart
//! changes for Sentry reports.

use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use tracing::instrument;

use shopkeep_core::{CartLineId, CartView, CartViewLine};

use crate::error::{Result, add_breadcrumb};
use crate::extract::{ValidatedJson, ValidationError, positive_id};
use crate::models::{AddToCartBody, CartLineResponse, MessageResponse, SetQuantityBody};
use crate::state::AppState;

/// Parse the `{line_id}` path segment.
fn line_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<CartLineId> {
    let Path(id) = path.map_err(ValidationError::from)?;
    Ok(CartLineId::new(positive_id("line_id", Some(id))?))
}

/// The priced lines of the cart.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<CartViewLine>>> {
    let view = state.cart().view().await?;
    Ok(Json(view.lines))
}

/// The priced cart with totals.
#[instrument(skip(state))]
pub async fn summary(State(state): State<AppState>) -> Result<Json<CartView>> {
    Ok(Json(state.cart().view().await?))
}

/// Add units of a product to the cart.
#[instrument(skip_all)]
pub async fn add(
    State(state): State<AppState>,
    ValidatedJson(cmd): ValidatedJson<AddToCartBody>,
) -> Result<Json<CartLineResponse>> {
    let line = state
        .cart()
        .add_or_increment(cmd.product_id, cmd.quantity)
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        &[
            ("product_id", cmd.product_id.to_string()),
            ("quantity", cmd.quantity.to_string()),
        ],
    );

    let message = format!("Added {} item(s) to cart", cmd.quantity);
    Ok(Json(CartLineResponse::new(&line, message)))
}

/// Overwrite the quantity of a line.
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
    ValidatedJson(quantity): ValidatedJson<SetQuantityBody>,
) -> Result<Json<CartLineResponse>> {
    let line_id = line_id(path)?;
    let line = state.cart().set_quantity(line_id, quantity).await?;

    add_breadcrumb(
        "cart",
        "Updated quantity",
        &[
            ("line_id", line_id.to_string()),
            ("quantity", quantity.to_string()),
        ],
    );

    Ok(Json(CartLineResponse::new(&line, "Quantity updated")))
}

/// Remove a line. Removing a missing line succeeds.
#[instrument(skip_all)]
pub async fn remove(
    State(state): State<AppState>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageResponse>> {
    let line_id = line_id(path)?;
    let deleted = state.cart().remove(line_id).await?;

    add_breadcrumb(
        "cart",
        "Removed from cart",
        &[
            ("line_id", line_id.to_string()),
            ("deleted", deleted.to_string()),
        ],
    );

    let message = if deleted {
        "Item removed from cart"
    } else {
        "Item was not in cart"
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}
