//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health              - Liveness check
//! GET    /health/ready        - Readiness check (database)
//!
//! # Catalog
//! GET    /products            - Product listing (?category=&search=&limit=)
//! GET    /products/{id}       - Product detail
//!
//! # Cart
//! GET    /cart                - Priced cart lines
//! POST   /cart                - Add or increment a product
//! GET    /cart/summary        - Lines with total, item count and line count
//! PUT    /cart/{line_id}      - Set a line's quantity
//! DELETE /cart/{line_id}      - Remove a line
//!
//! # Tools (called back by the chat service)
//! GET    /tools               - Tool definitions
//! POST   /tools/{name}        - Execute a tool
//!
//! # Chat
//! POST   /chat                - Forward a message to the chat service
//! ```

pub mod cart;
pub mod chat;
pub mod health;
pub mod products;
pub mod tools;

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, Request, Response, header},
    middleware::from_fn,
    routing::{get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{REQUEST_ID_HEADER, request_id_middleware};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::index).post(cart::add))
        .route("/summary", get(cart::summary))
        .route("/{line_id}", put(cart::update).delete(cart::remove))
}

/// Create the tool routes router.
pub fn tool_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(tools::index))
        .route("/{name}", post(tools::execute))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/tools", tool_routes())
        .route("/chat", post(chat::send))
}

/// Build the complete application: routes, state and middleware.
pub fn app(state: AppState) -> Router {
    let cors = state.config().cors_origin.as_deref().and_then(cors_layer);

    let mut app = routes().with_state(state);
    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app.layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS for the browser UI at `origin`.
fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let Ok(origin) = HeaderValue::from_str(origin) else {
        tracing::error!(origin, "Invalid CORS origin; CORS disabled");
        return None;
    };

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, request_id.clone()])
            .expose_headers([request_id])
            .max_age(Duration::from_secs(600)),
    )
}
