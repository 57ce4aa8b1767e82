// Each integration test binary compiles this module separately and uses a
// different subset of the helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use barometra_api::{
    config::AppConfig,
    db,
    entities::{product, product_price, user},
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    payments::{
        CheckoutSessionParams, GatewayCustomer, GatewayPrice, GatewayProduct, HostedSession,
        PaymentGateway,
    },
    AppState,
};

/// In-process payment gateway double. Records every call so tests can assert
/// on external side effects; failure toggles simulate provider outages.
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicUsize,
    customers_created: Mutex<Vec<String>>,
    customers_deleted: Mutex<Vec<String>>,
    sessions: Mutex<Vec<CheckoutSessionParams>>,
    prices_archived: Mutex<Vec<String>>,
    fail_next_session: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}_test_{n}")
    }

    /// Makes the next `create_checkout_session` call fail.
    pub fn fail_next_session(&self) {
        self.fail_next_session.store(true, Ordering::SeqCst);
    }

    pub fn customers_created(&self) -> usize {
        self.customers_created.lock().unwrap().len()
    }

    pub fn customers_deleted(&self) -> usize {
        self.customers_deleted.lock().unwrap().len()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Line items of the most recent session, as (price_id, quantity).
    pub fn last_session_line_items(&self) -> Vec<(String, i64)> {
        self.sessions
            .lock()
            .unwrap()
            .last()
            .map(|s| {
                s.line_items
                    .iter()
                    .map(|li| (li.price_id.clone(), li.quantity))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn archived_prices(&self) -> Vec<String> {
        self.prices_archived.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_customer(
        &self,
        _email: &str,
        _name: &str,
    ) -> Result<GatewayCustomer, ServiceError> {
        let id = self.next_id("cus");
        self.customers_created.lock().unwrap().push(id.clone());
        Ok(GatewayCustomer { id })
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), ServiceError> {
        self.customers_deleted
            .lock()
            .unwrap()
            .push(customer_id.to_string());
        Ok(())
    }

    async fn create_product(&self, _name: &str) -> Result<GatewayProduct, ServiceError> {
        Ok(GatewayProduct {
            id: self.next_id("prod"),
        })
    }

    async fn create_price(
        &self,
        _product_id: &str,
        _currency: &str,
        _unit_amount: i64,
    ) -> Result<GatewayPrice, ServiceError> {
        Ok(GatewayPrice {
            id: self.next_id("price"),
        })
    }

    async fn archive_price(&self, price_id: &str) -> Result<(), ServiceError> {
        self.prices_archived
            .lock()
            .unwrap()
            .push(price_id.to_string());
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> Result<HostedSession, ServiceError> {
        if self.fail_next_session.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::ExternalService(
                "/v1/checkout/sessions returned 503".to_string(),
            ));
        }

        self.sessions.lock().unwrap().push(params);
        let id = self.next_id("cs");
        Ok(HostedSession {
            url: format!("https://pay.example/session/{id}"),
            id,
        })
    }
}

/// Test harness: application state backed by an in-memory SQLite database
/// and the [`FakeGateway`].
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory db.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(FakeGateway::new());
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            gateway.clone(),
            &cfg.payment,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = barometra_api::app_router().with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Seed a shop user.
    pub async fn seed_user(&self, email: &str) -> user::Model {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            name: Set(format!("Test user {email}")),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user")
    }

    /// Seed a product with stock.
    pub async fn seed_product(
        &self,
        name: &str,
        slug: &str,
        stock: i32,
        is_active: bool,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            description: Set(None),
            stock: Set(stock),
            is_active: Set(is_active),
            provider_product_id: Set(Some(format!("prod_seed_{slug}"))),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    /// Seed an active per-currency price, in minor units.
    pub async fn seed_price(
        &self,
        product_id: Uuid,
        currency: &str,
        unit_amount: i64,
        provider_price_id: Option<&str>,
    ) -> product_price::Model {
        product_price::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            currency: Set(currency.to_string()),
            unit_amount: Set(unit_amount),
            provider_price_id: Set(provider_price_id.map(str::to_string)),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed price")
    }
}

/// Parse a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Standard checkout payload for one product line.
pub fn checkout_payload(user_id: Uuid, product_id: Uuid, quantity: i32, currency: &str) -> Value {
    serde_json::json!({
        "user_id": user_id.to_string(),
        "currency": currency,
        "items": [
            { "product_id": product_id.to_string(), "quantity": quantity }
        ],
        "shipping_address": {
            "recipient_name": "Jo Vermeer",
            "line1": "Herengracht 12",
            "city": "Amsterdam",
            "postal_code": "1015 BK",
            "country": "NL"
        }
    })
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
