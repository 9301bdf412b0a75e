//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding. All route handlers return `Result<T, AppError>`.
//!
//! Every error body is JSON: `{"error": "<kind>", "message": "<text>"}`, plus
//! kind-specific fields such as `product_id` or `orphaned_line_ids`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::extract::ValidationError;
use crate::services::CartError;
use crate::tools::ToolError;

/// Seconds a client should wait before retrying a contended write.
const RETRY_AFTER_SECS: &str = "1";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body or parameters failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Catalog read failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Tool could not be executed.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A dependency is not ready.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Cart(err) => match err {
                CartError::ProductNotFound(_) | CartError::LineNotFound(_) => StatusCode::NOT_FOUND,
                CartError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
                CartError::ContentionRetryable => StatusCode::SERVICE_UNAVAILABLE,
                CartError::DataIntegrity(_)
                | CartError::PricingOverflow(_)
                | CartError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Database(err) if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Tool(ToolError::UnknownTool(_)) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Tool(ToolError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Cart(err) => err.kind(),
            Self::Database(err) if err.is_retryable() => "contention_retryable",
            Self::Database(_) => "store_unavailable",
            Self::Tool(ToolError::UnknownTool(_)) => "unknown_tool",
            Self::Tool(ToolError::InvalidInput(_)) => "invalid_tool_input",
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether this error is a server-side fault worth reporting.
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Cart(
                    CartError::DataIntegrity(_)
                        | CartError::PricingOverflow(_)
                        | CartError::StoreUnavailable(_)
                )
        )
    }

    /// The JSON body, without internal details for server errors.
    fn body(&self) -> Value {
        let message = match self {
            Self::Validation(err) => err.to_string(),
            Self::Cart(CartError::DataIntegrity(_)) => {
                "Cart references products that no longer exist".to_string()
            }
            Self::Cart(CartError::PricingOverflow(_)) => {
                "Cart total is out of range".to_string()
            }
            Self::Cart(CartError::StoreUnavailable(_)) | Self::Database(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Cart(CartError::ContentionRetryable) => {
                "Cart is busy, please retry".to_string()
            }
            Self::Cart(err) => err.to_string(),
            Self::Tool(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unavailable(what) => format!("{what} unavailable"),
        };

        let mut body = json!({
            "error": self.kind(),
            "message": message,
        });

        match self {
            Self::Cart(CartError::ProductNotFound(id)) => {
                body["product_id"] = json!(id);
            }
            Self::Cart(CartError::LineNotFound(id)) => {
                body["line_id"] = json!(id);
            }
            Self::Cart(CartError::DataIntegrity(orphans)) => {
                body["orphaned_line_ids"] = json!(orphans.line_ids);
                body["partial"] = json!(orphans.partial);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }

        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a cart mutation.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// changes leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use shopkeep_core::{CartLineId, CartView, OrphanedLines, PriceError, ProductId, QuantityError};

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product 7".to_string());
        assert_eq!(err.to_string(), "Not found: Product 7");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: impl Into<AppError>) -> StatusCode {
            err.into().into_response().status()
        }

        assert_eq!(
            get_status(CartError::ProductNotFound(ProductId::new(1))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::LineNotFound(CartLineId::new(1))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CartError::InvalidQuantity(QuantityError::NotPositive(0))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ValidationError::MissingField("quantity")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::StoreUnavailable(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(ToolError::UnknownTool("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ToolError::InvalidInput("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::Busy("locked".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_contention_sets_retry_after() {
        let response = AppError::from(CartError::ContentionRetryable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[RETRY_AFTER], "1");
        assert_eq!(body_json(response).await["error"], "contention_retryable");
    }

    #[tokio::test]
    async fn test_body_carries_kind_specific_fields() {
        let response =
            AppError::from(CartError::ProductNotFound(ProductId::new(42))).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "product_not_found");
        assert_eq!(body["product_id"], 42);

        let orphans = OrphanedLines {
            line_ids: vec![CartLineId::new(3), CartLineId::new(5)],
            partial: CartView::empty(),
        };
        let response = AppError::from(CartError::DataIntegrity(Box::new(orphans))).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"], "data_integrity");
        assert_eq!(body["orphaned_line_ids"], json!([3, 5]));
        assert_eq!(body["partial"]["lines"], json!([]));
        assert_eq!(body["partial"]["total"], "0.00");
    }

    #[tokio::test]
    async fn test_pricing_overflow_is_a_server_error() {
        let err = CartError::PricingOverflow(PriceError::Overflow);
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "pricing_overflow");
        assert_eq!(body["message"], "Cart total is out of range");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = RepositoryError::DataCorruption("secret table layout".to_string());
        let body = body_json(AppError::from(err).into_response()).await;
        assert_eq!(body["message"], "Internal server error");
    }
}
