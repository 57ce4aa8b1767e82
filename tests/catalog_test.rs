//! Integration tests for the catalog: product CRUD, stock updates and
//! per-currency price sync against the payment provider.

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn products_are_created_and_fetched_by_slug() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Georgian stick barometer",
                "slug": "georgian-stick",
                "description": "Mahogany case, circa 1790",
                "stock": 1
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let created = response_json(response).await;
    assert_eq!(created["is_active"], json!(true));

    let fetched = response_json(
        app.request(Method::GET, "/api/v1/products/by-slug/georgian-stick", None)
            .await,
    )
    .await;
    assert_eq!(fetched["name"], json!("Georgian stick barometer"));
    assert_eq!(fetched["stock"], json!(1));
    assert_eq!(fetched["prices"], json!([]));
}

#[tokio::test]
async fn setting_a_price_provisions_provider_resources() {
    let app = TestApp::new().await;

    let created = response_json(
        app.request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Aneroid wall barometer",
                "slug": "aneroid-wall",
                "stock": 4
            })),
        )
        .await,
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let price = response_json(
        app.request(
            Method::PUT,
            &format!("/api/v1/products/{id}/price"),
            Some(json!({ "currency": "eur", "unit_amount": 45_000 })),
        )
        .await,
    )
    .await;

    assert_eq!(price["currency"], json!("EUR"));
    assert_eq!(price["unit_amount"], json!(45_000));

    let fetched = response_json(
        app.request(Method::GET, "/api/v1/products/by-slug/aneroid-wall", None)
            .await,
    )
    .await;
    assert_eq!(fetched["prices"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn replacing_a_price_archives_the_old_provider_price() {
    let app = TestApp::new().await;

    let created = response_json(
        app.request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Ship's aneroid",
                "slug": "ships-aneroid",
                "stock": 2
            })),
        )
        .await,
    )
    .await;
    let id = created["id"].as_str().unwrap();

    for amount in [60_000, 55_000] {
        let response = app
            .request(
                Method::PUT,
                &format!("/api/v1/products/{id}/price"),
                Some(json!({ "currency": "EUR", "unit_amount": amount })),
            )
            .await;
        assert_eq!(response.status(), 200);
    }

    // The replaced provider price was archived, and only the new price is
    // active locally.
    assert_eq!(app.gateway.archived_prices().len(), 1);

    let fetched = response_json(
        app.request(Method::GET, "/api/v1/products/by-slug/ships-aneroid", None)
            .await,
    )
    .await;
    let prices = fetched["prices"].as_array().unwrap();
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[0]["unit_amount"], json!(55_000));
}

#[tokio::test]
async fn stock_updates_are_absolute_and_non_negative() {
    let app = TestApp::new().await;

    let created = response_json(
        app.request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Pocket altimeter",
                "slug": "pocket-altimeter",
                "stock": 1
            })),
        )
        .await,
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let updated = response_json(
        app.request(
            Method::PUT,
            &format!("/api/v1/products/{id}/stock"),
            Some(json!({ "stock": 7 })),
        )
        .await,
    )
    .await;
    assert_eq!(updated["stock"], json!(7));

    let rejected = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}/stock"),
            Some(json!({ "stock": -1 })),
        )
        .await;
    assert_eq!(rejected.status(), 400);
}

#[tokio::test]
async fn deactivated_products_drop_out_of_the_active_listing() {
    let app = TestApp::new().await;

    let created = response_json(
        app.request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Restoration project",
                "slug": "restoration-project",
                "stock": 1
            })),
        )
        .await,
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{id}"),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let listing = response_json(
        app.request(Method::GET, "/api/v1/products?active_only=true", None)
            .await,
    )
    .await;
    assert_eq!(listing["pagination"]["total"], json!(0));

    let all = response_json(app.request(Method::GET, "/api/v1/products", None).await).await;
    assert_eq!(all["pagination"]["total"], json!(1));
}
