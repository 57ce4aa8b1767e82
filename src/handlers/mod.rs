pub mod checkout;
pub mod common;
pub mod customers;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod products;

use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::payments::PaymentGateway;
use crate::services::checkout::CheckoutService;
use crate::services::customers::CustomerService;
use crate::services::orders::OrderService;
use crate::services::products::ProductCatalogService;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer wired up once at startup and shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub customers: Arc<CustomerService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub catalog: Arc<ProductCatalogService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
        payment_cfg: &PaymentConfig,
    ) -> Self {
        let customers = Arc::new(CustomerService::new(
            db.clone(),
            gateway.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let catalog = Arc::new(ProductCatalogService::new(
            db.clone(),
            gateway.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            db,
            customers.clone(),
            orders.clone(),
            gateway,
            event_sender,
            payment_cfg.success_url.clone(),
            payment_cfg.cancel_url.clone(),
        ));

        Self {
            customers,
            orders,
            checkout,
            catalog,
        }
    }
}
