use crate::cart::Cart;
use crate::handlers::common::validate_input;
use crate::services::checkout::CheckoutRequest;
use crate::services::orders::ShippingDetails;
use crate::AppState;
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Runs the checkout action.
///
/// This is the outermost boundary of the checkout flow: every service error
/// is converted into the uniform `{success: false, error}` body the
/// storefront displays verbatim. Partial progress (an order persisted but no
/// payment session) is not distinguished here.
async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> impl IntoResponse {
    if let Err(e) = validate_input(&payload) {
        return Json(CheckoutResponse::failure(e.to_string()));
    }

    let mut cart = Cart::new();
    for item in &payload.items {
        cart = cart.add(item.product_id, item.quantity);
    }

    let request = CheckoutRequest {
        user_id: payload.user_id,
        cart,
        currency: payload.currency,
        shipping: ShippingDetails {
            recipient_name: payload.shipping_address.recipient_name,
            line1: payload.shipping_address.line1,
            line2: payload.shipping_address.line2,
            city: payload.shipping_address.city,
            postal_code: payload.shipping_address.postal_code,
            country: payload.shipping_address.country,
        },
    };

    match state.services.checkout.checkout(request).await {
        Ok(outcome) => Json(CheckoutResponse::success(
            outcome.order_id,
            outcome.checkout_url,
        )),
        Err(e) => Json(CheckoutResponse::failure(e.to_string())),
    }
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutPayload {
    pub user_id: Uuid,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,

    #[validate(length(min = 1, message = "Cart cannot be empty"))]
    pub items: Vec<CartItemPayload>,

    #[validate]
    pub shipping_address: ShippingAddressPayload,
}

// Per-line quantity bounds are enforced by the stock validator.
#[derive(Debug, Deserialize, Serialize)]
pub struct CartItemPayload {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ShippingAddressPayload {
    #[validate(length(min = 1))]
    pub recipient_name: String,
    #[validate(length(min = 1))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(length(equal = 2, message = "Country must be a 2-letter ISO code"))]
    pub country: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckoutResponse {
    fn success(order_id: Uuid, checkout_url: String) -> Self {
        Self {
            success: true,
            order_id: Some(order_id),
            checkout_url: Some(checkout_url),
            error: None,
        }
    }

    fn failure(error: String) -> Self {
        Self {
            success: false,
            order_id: None,
            checkout_url: None,
            error: Some(error),
        }
    }
}
