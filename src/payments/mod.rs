//! Payment provider boundary.
//!
//! The provider is an opaque collaborator: the service layer only depends on
//! the [`PaymentGateway`] trait, which constrains call order and error
//! handling, not the provider's wire protocol. [`http::HttpPaymentGateway`]
//! is the production implementation; tests substitute their own.

use async_trait::async_trait;

use crate::errors::ServiceError;

pub mod http;

pub use http::HttpPaymentGateway;

/// Billing customer resource at the provider.
#[derive(Debug, Clone)]
pub struct GatewayCustomer {
    pub id: String,
}

/// Product resource at the provider.
#[derive(Debug, Clone)]
pub struct GatewayProduct {
    pub id: String,
}

/// Price resource at the provider.
#[derive(Debug, Clone)]
pub struct GatewayPrice {
    pub id: String,
}

/// One line of a hosted checkout session, referencing a provider price id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLineItem {
    pub price_id: String,
    pub quantity: i64,
}

/// Parameters for opening a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionParams {
    /// Provider customer id the session is billed to
    pub customer_id: String,
    /// Internal order id, echoed back by the provider's webhooks
    pub client_reference_id: String,
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted payment session the buyer is redirected to.
#[derive(Debug, Clone)]
pub struct HostedSession {
    pub id: String,
    pub url: String,
}

/// Async client for the payment provider.
///
/// Every method is a network call; callers are suspended until the provider
/// answers (transport defaults only, no extra timeout — matching the rest of
/// the checkout flow).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
    ) -> Result<GatewayCustomer, ServiceError>;

    /// Best-effort compensation for a customer created moments ago.
    async fn delete_customer(&self, customer_id: &str) -> Result<(), ServiceError>;

    async fn create_product(&self, name: &str) -> Result<GatewayProduct, ServiceError>;

    async fn create_price(
        &self,
        product_id: &str,
        currency: &str,
        unit_amount: i64,
    ) -> Result<GatewayPrice, ServiceError>;

    /// Archives a price that has been superseded. Archived prices stay
    /// resolvable for historical sessions.
    async fn archive_price(&self, price_id: &str) -> Result<(), ServiceError>;

    async fn create_checkout_session(
        &self,
        params: CheckoutSessionParams,
    ) -> Result<HostedSession, ServiceError>;
}
