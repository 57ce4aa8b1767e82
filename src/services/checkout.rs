use std::sync::Arc;

use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cart::Cart;
use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::payments::{CheckoutSessionParams, PaymentGateway, SessionLineItem};
use crate::services::customers::CustomerService;
use crate::services::inventory;
use crate::services::orders::{OrderDraft, OrderLine, OrderService, ShippingDetails};

/// Checkout request assembled by the handler.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub cart: Cart,
    pub currency: String,
    pub shipping: ShippingDetails,
}

/// Successful checkout: where to send the buyer, and which order to show on
/// return.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order_id: Uuid,
    pub checkout_url: String,
}

/// Orchestrates the checkout sequence: customer resolution, stock
/// validation, order aggregation, hosted payment session.
///
/// Steps run strictly sequentially; there is no retry anywhere in the flow.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    customers: Arc<CustomerService>,
    orders: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
    success_url: String,
    cancel_url: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        customers: Arc<CustomerService>,
        orders: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        Self {
            db,
            customers,
            orders,
            gateway,
            event_sender,
            success_url,
            cancel_url,
        }
    }

    /// Runs a full checkout for a user's cart.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, currency = %request.currency))]
    pub async fn checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let customer = self.customers.resolve_for_user(request.user_id).await?;

        // Availability check on one consistent snapshot. The transaction is
        // read-only; nothing is reserved between here and order creation.
        let txn = self.db.begin().await?;
        let products = inventory::validate_stock(&txn, &request.cart.lines).await?;
        txn.commit().await?;

        let quantities: Vec<i32> = {
            let mut qty = Vec::with_capacity(products.len());
            for product in &products {
                let total: i32 = request
                    .cart
                    .lines
                    .iter()
                    .filter(|l| l.product_id == product.id)
                    .map(|l| l.quantity)
                    .sum();
                qty.push(total);
            }
            qty
        };

        let lines: Vec<OrderLine> = products
            .into_iter()
            .zip(quantities)
            .map(|(product, quantity)| OrderLine { product, quantity })
            .collect();

        let created = self
            .orders
            .create_order(
                &customer,
                OrderDraft {
                    currency: request.currency.clone(),
                    lines,
                    shipping: request.shipping.clone(),
                },
            )
            .await?;

        let order_id = created.order.id;

        let session_params = match self.build_session_params(&customer.provider_customer_id, &created)
        {
            Ok(params) => params,
            Err(e) => {
                self.fail_order(order_id, &e).await;
                return Err(e);
            }
        };

        let session = match self.gateway.create_checkout_session(session_params).await {
            Ok(session) => session,
            Err(e) => {
                self.fail_order(order_id, &e).await;
                return Err(e);
            }
        };

        let order = self
            .orders
            .set_provider_session(order_id, &session.id)
            .await?;

        info!(
            order_id = %order.id,
            session_id = %session.id,
            "Checkout session created"
        );
        self.event_sender
            .send(Event::CheckoutCompleted {
                order_id,
                session_id: session.id.clone(),
            })
            .await;

        Ok(CheckoutOutcome {
            order_id,
            checkout_url: session.url,
        })
    }

    /// Builds provider line items from the captured price rows. Every product
    /// must carry a synced provider price id in the order currency; this is
    /// checked only now, after the order has been persisted.
    fn build_session_params(
        &self,
        provider_customer_id: &str,
        created: &crate::services::orders::CreatedOrder,
    ) -> Result<CheckoutSessionParams, ServiceError> {
        let mut line_items = Vec::with_capacity(created.items.len());
        for item in &created.items {
            let price = created.prices.get(&item.product_id).ok_or_else(|| {
                ServiceError::ExternalService(format!(
                    "no {} price recorded for \"{}\"",
                    created.order.currency, item.product_name
                ))
            })?;

            let price_id = price.provider_price_id.clone().ok_or_else(|| {
                ServiceError::ExternalService(format!(
                    "product \"{}\" has no synced {} price at the payment provider",
                    item.product_name, created.order.currency
                ))
            })?;

            line_items.push(SessionLineItem {
                price_id,
                quantity: i64::from(item.quantity),
            });
        }

        Ok(CheckoutSessionParams {
            customer_id: provider_customer_id.to_string(),
            client_reference_id: created.order.id.to_string(),
            line_items,
            success_url: format!("{}?session_id={{CHECKOUT_SESSION_ID}}", self.success_url),
            cancel_url: self.cancel_url.clone(),
        })
    }

    /// Marks an order failed after session creation fell over, so no pending
    /// order lingers without a session. Best-effort: a failed update is
    /// logged and the original error still reaches the caller.
    async fn fail_order(&self, order_id: Uuid, cause: &ServiceError) {
        error!(order_id = %order_id, error = %cause, "Payment session creation failed");

        if let Err(mark_err) = self
            .orders
            .transition_status(order_id, OrderStatus::Failed)
            .await
        {
            warn!(
                order_id = %order_id,
                error = %mark_err,
                "Could not mark order failed after session failure"
            );
        }

        self.event_sender
            .send(Event::CheckoutFailed {
                order_id: Some(order_id),
                reason: cause.to_string(),
            })
            .await;
    }
}
