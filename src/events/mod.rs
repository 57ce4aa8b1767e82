use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services. Consumed in-process by
/// [`process_events`]; nothing here blocks the request path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Checkout / order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    CheckoutCompleted {
        order_id: Uuid,
        session_id: String,
    },
    CheckoutFailed {
        order_id: Option<Uuid>,
        reason: String,
    },

    // Customer events
    CustomerProvisioned(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    PriceUpdated {
        product_id: Uuid,
        currency: String,
    },
    StockAdjusted {
        product_id: Uuid,
        old_stock: i32,
        new_stock: i32,
    },
}

/// Cloneable handle for emitting events from services.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event; a full or closed channel is logged, never propagated
    /// to the caller.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Failed to enqueue event: {}", e);
        }
    }
}

/// Event processing loop, spawned once at startup. Currently the consumers
/// are log-only; outbound notifications hang off this loop when they arrive.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    from = %old_status,
                    to = %new_status,
                    "Order status changed"
                );
            }
            Event::CheckoutCompleted {
                order_id,
                session_id,
            } => {
                info!(
                    order_id = %order_id,
                    session_id = %session_id,
                    "Checkout completed"
                );
            }
            Event::CheckoutFailed { order_id, reason } => {
                warn!(order_id = ?order_id, reason = %reason, "Checkout failed");
            }
            Event::CustomerProvisioned(customer_id) => {
                info!(customer_id = %customer_id, "Billing customer provisioned");
            }
            Event::ProductCreated(product_id) => {
                info!(product_id = %product_id, "Product created");
            }
            Event::PriceUpdated {
                product_id,
                currency,
            } => {
                info!(product_id = %product_id, currency = %currency, "Price updated");
            }
            Event::StockAdjusted {
                product_id,
                old_stock,
                new_stock,
            } => {
                info!(
                    product_id = %product_id,
                    old_stock = old_stock,
                    new_stock = new_stock,
                    "Stock adjusted"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
