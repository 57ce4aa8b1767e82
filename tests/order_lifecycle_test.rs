//! Integration tests for the order read side and webhook-driven status
//! transitions, plus the storage-level order-number uniqueness guarantee.

mod common;

use axum::http::Method;
use chrono::Utc;
use common::{checkout_payload, response_json, TestApp};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use uuid::Uuid;

use barometra_api::entities::{customer, order, order::OrderStatus, shipping_address};
use barometra_api::services::orders::is_unique_violation;

async fn checkout_session_id(app: &TestApp) -> (String, String) {
    let user = app.seed_user("lifecycle@example.com").await;
    let product = app.seed_product("Banjo barometer", "banjo-barometer", 3, true).await;
    app.seed_price(product.id, "EUR", 185_000, Some("price_eur_banjo")).await;

    let body = response_json(
        app.request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_payload(user.id, product.id, 1, "EUR")),
        )
        .await,
    )
    .await;
    assert_eq!(body["success"], json!(true), "body: {body}");

    let order_id = body["order_id"].as_str().unwrap().to_string();
    let detail = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    let session_id = detail["provider_session_id"].as_str().unwrap().to_string();

    (order_id, session_id)
}

#[tokio::test]
async fn completed_session_webhook_marks_the_order_paid() {
    let app = TestApp::new().await;
    let (order_id, session_id) = checkout_session_id(&app).await;

    let response = app
        .request(
            Method::POST,
            "/webhooks/payment",
            Some(json!({
                "type": "checkout.session.completed",
                "data": { "session_id": session_id }
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let ack = response_json(response).await;
    assert_eq!(ack["processed"], json!(true));

    let detail = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    assert_eq!(detail["status"], json!("paid"));
}

#[tokio::test]
async fn paid_orders_ignore_later_session_events() {
    let app = TestApp::new().await;
    let (order_id, session_id) = checkout_session_id(&app).await;

    for (event_type, expected_processed) in [
        ("checkout.session.completed", true),
        // Duplicate delivery and a late expiry must not move a paid order.
        ("checkout.session.completed", false),
        ("checkout.session.expired", false),
    ] {
        let response = app
            .request(
                Method::POST,
                "/webhooks/payment",
                Some(json!({
                    "type": event_type,
                    "data": { "session_id": session_id }
                })),
            )
            .await;
        assert_eq!(response.status(), 200);
        let ack = response_json(response).await;
        assert_eq!(ack["processed"], json!(expected_processed), "{event_type}");
    }

    let detail = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    assert_eq!(detail["status"], json!("paid"));
}

#[tokio::test]
async fn expired_session_webhook_cancels_the_order() {
    let app = TestApp::new().await;
    let (order_id, session_id) = checkout_session_id(&app).await;

    let ack = response_json(
        app.request(
            Method::POST,
            "/webhooks/payment",
            Some(json!({
                "type": "checkout.session.expired",
                "data": { "session_id": session_id }
            })),
        )
        .await,
    )
    .await;
    assert_eq!(ack["processed"], json!(true));

    let detail = response_json(
        app.request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
            .await,
    )
    .await;
    assert_eq!(detail["status"], json!("cancelled"));
}

#[tokio::test]
async fn unknown_session_webhooks_are_acknowledged() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/webhooks/payment",
            Some(json!({
                "type": "checkout.session.completed",
                "data": { "session_id": "cs_never_issued" }
            })),
        )
        .await;

    assert_eq!(response.status(), 200);
    let ack = response_json(response).await;
    assert_eq!(ack["received"], json!(true));
    assert_eq!(ack["processed"], json!(false));
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/webhooks/payment",
            Some(json!({
                "type": "invoice.created",
                "data": { "session_id": "cs_whatever" }
            })),
        )
        .await;

    assert_eq!(response.status(), 200);
    let ack = response_json(response).await;
    assert_eq!(ack["processed"], json!(false));
}

#[tokio::test]
async fn orders_resolve_by_payment_session_id() {
    let app = TestApp::new().await;
    let (order_id, session_id) = checkout_session_id(&app).await;

    let detail = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/orders/by-session/{session_id}"),
            None,
        )
        .await,
    )
    .await;

    assert_eq!(detail["id"], json!(order_id));
    assert_eq!(detail["provider_session_id"], json!(session_id));
}

#[tokio::test]
async fn lookup_by_unknown_session_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/orders/by-session/cs_missing", None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn duplicate_order_numbers_hit_the_unique_index() {
    let app = TestApp::new().await;

    let user = app.seed_user("collision@example.com").await;
    let customer = customer::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        provider_customer_id: Set("cus_fixed".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let address = shipping_address::ActiveModel {
        id: Set(Uuid::new_v4()),
        recipient_name: Set("Jo Vermeer".to_string()),
        line1: Set("Herengracht 12".to_string()),
        line2: Set(None),
        city: Set("Amsterdam".to_string()),
        postal_code: Set("1015 BK".to_string()),
        country: Set("NL".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&*app.state.db)
    .await
    .unwrap();

    let insert_order = |number: &str| order::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_number: Set(number.to_string()),
        customer_id: Set(customer.id),
        status: Set(OrderStatus::Pending),
        currency: Set("EUR".to_string()),
        subtotal: Set(1000),
        shipping_cost: Set(0),
        tax: Set(0),
        total: Set(1000),
        shipping_address_id: Set(address.id),
        provider_session_id: Set(None),
        ..Default::default()
    };

    insert_order("BAR-20240301120000-AAAAAA")
        .insert(&*app.state.db)
        .await
        .expect("first insert succeeds");

    let err = insert_order("BAR-20240301120000-AAAAAA")
        .insert(&*app.state.db)
        .await
        .expect_err("second insert collides");

    // This is exactly what create_order's retry loop keys on.
    assert!(is_unique_violation(&err), "got: {err:?}");
}

#[tokio::test]
async fn health_endpoint_reports_database_up() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["database"], json!("up"));
}
