use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Creates the router for payment provider webhooks
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/payment", post(handle_payment_event))
}

/// Consumes checkout-session lifecycle events from the payment provider and
/// moves the matching order through the status machine.
///
/// The provider retries non-2xx deliveries, so everything that is not a
/// malformed payload is acknowledged with 200: unknown event types, unknown
/// session ids and illegal transitions (duplicate deliveries land here) are
/// logged and swallowed.
// TODO: verify the provider's signature header once the signing secret is
// wired into PaymentConfig.
async fn handle_payment_event(
    State(state): State<AppState>,
    Json(event): Json<ProviderEvent>,
) -> impl IntoResponse {
    let Some(next_status) = status_for_event(&event.event_type) else {
        info!(event_type = %event.event_type, "Ignoring unhandled webhook event type");
        return (StatusCode::OK, Json(WebhookAck::ignored()));
    };

    let session_id = &event.data.session_id;
    let order = match state
        .services
        .orders
        .find_by_provider_session(session_id)
        .await
    {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(session_id = %session_id, "Webhook for unknown payment session");
            return (StatusCode::OK, Json(WebhookAck::ignored()));
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Webhook order lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAck::ignored()),
            );
        }
    };

    match state
        .services
        .orders
        .transition_status(order.id, next_status)
        .await
    {
        Ok(updated) => {
            info!(
                order_id = %updated.id,
                status = %updated.status.as_str(),
                "Order status updated from webhook"
            );
            (StatusCode::OK, Json(WebhookAck::processed()))
        }
        Err(ServiceError::InvalidOperation(msg)) => {
            // Terminal orders re-delivered by the provider end up here.
            info!(order_id = %order.id, %msg, "Skipping webhook transition");
            (StatusCode::OK, Json(WebhookAck::ignored()))
        }
        Err(e) => {
            warn!(order_id = %order.id, error = %e, "Webhook transition failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookAck::ignored()),
            )
        }
    }
}

fn status_for_event(event_type: &str) -> Option<OrderStatus> {
    match event_type {
        "checkout.session.completed" => Some(OrderStatus::Paid),
        "checkout.session.async_payment_failed" => Some(OrderStatus::Failed),
        "checkout.session.expired" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

// Webhook payload DTOs

#[derive(Debug, Deserialize)]
pub struct ProviderEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: ProviderEventData,
}

#[derive(Debug, Deserialize)]
pub struct ProviderEventData {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub processed: bool,
}

impl WebhookAck {
    fn processed() -> Self {
        Self {
            received: true,
            processed: true,
        }
    }

    fn ignored() -> Self {
        Self {
            received: true,
            processed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_events_map_to_statuses() {
        assert_eq!(
            status_for_event("checkout.session.completed"),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            status_for_event("checkout.session.expired"),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(
            status_for_event("checkout.session.async_payment_failed"),
            Some(OrderStatus::Failed)
        );
        assert_eq!(status_for_event("invoice.created"), None);
    }
}
