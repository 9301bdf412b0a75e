//! End-to-end catalog and health tests.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::Value;

use shopkeep_integration_tests::TestContext;

async fn names(ctx: &TestContext, query: &str) -> Vec<String> {
    let resp = ctx
        .client
        .get(ctx.url(&format!("/products{query}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "{query}");
    let products: Vec<Value> = resp.json().await.unwrap();
    products
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;

    let resp = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = ctx.client.get(ctx.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_products_in_id_order() {
    let ctx = TestContext::new().await;
    assert_eq!(
        names(&ctx, "").await,
        [
            "Wireless Headphones",
            "Wool Socks",
            "Camping Tent",
            "Portable Charger"
        ]
    );
}

#[tokio::test]
async fn test_list_products_filters() {
    let ctx = TestContext::new().await;

    assert_eq!(
        names(&ctx, "?category=electronics").await,
        ["Wireless Headphones", "Portable Charger"]
    );
    assert_eq!(names(&ctx, "?search=DOME").await, ["Camping Tent"]);
    assert_eq!(names(&ctx, "?limit=2").await.len(), 2);
    assert!(names(&ctx, "?category=garden").await.is_empty());
}

#[tokio::test]
async fn test_bad_query_is_rejected() {
    let ctx = TestContext::new().await;
    let resp = ctx
        .client
        .get(ctx.url("/products?limit=lots"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_show_product() {
    let ctx = TestContext::new().await;

    let resp = ctx.client.get(ctx.url("/products/3")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let product: Value = resp.json().await.unwrap();
    assert_eq!(product["name"], "Camping Tent");
    assert_eq!(product["price"], "100.00");
    assert_eq!(product["emoji"], "⛺");

    let resp = ctx.client.get(ctx.url("/products/77")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let ctx = TestContext::new().await;

    let resp = ctx
        .client
        .get(ctx.url("/products"))
        .header("x-request-id", "chat-turn-7")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "chat-turn-7");

    let resp = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert!(resp.headers().contains_key("x-request-id"));
}
