//! Barometra API Library
//!
//! Backend for the Barometra antique barometer shop: catalog and stock
//! management, checkout orchestration and hosted payment sessions.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cart;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod payments;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Composes the versioned API surface.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/products", handlers::products::product_routes())
        .nest("/customers", handlers::customers::customer_routes())
}

/// Composes the full application router minus middleware layers.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "barometra-api up" }))
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        .nest("/webhooks", handlers::payment_webhooks::webhook_routes())
}
