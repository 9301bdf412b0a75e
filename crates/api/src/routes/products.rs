//! Catalog route handlers.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use tracing::instrument;

use shopkeep_core::{Product, ProductId};

use crate::db::ProductFilter;
use crate::error::{AppError, Result};
use crate::extract::{ValidationError, positive_id};
use crate::state::AppState;

/// List products, optionally filtered by category, search term and limit.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    query: std::result::Result<Query<ProductFilter>, QueryRejection>,
) -> Result<Json<Vec<Product>>> {
    let Query(filter) = query.map_err(ValidationError::from)?;
    let products = state.catalog().list(filter).await?;
    Ok(Json(products))
}

/// Show a single product.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<Product>> {
    let Path(id) = id.map_err(ValidationError::from)?;
    let id = ProductId::new(positive_id("id", Some(id))?);

    state
        .catalog()
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id}")))
}
