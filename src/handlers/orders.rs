use crate::entities::{order, order_item};
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response, PaginatedResponse, PaginationParams};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use uuid::Uuid;

/// Creates the router for order read endpoints
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/by-session/:session_id", get(get_order_by_session))
}

/// List orders, newest first
async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .list_orders(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    let data: Vec<OrderSummary> = orders.into_iter().map(OrderSummary::from).collect();
    Ok(success_response(PaginatedResponse::new(
        data,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Get a single order with items
async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (order, items) = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id}")))?;

    Ok(success_response(OrderDetail::from_parts(order, items)))
}

/// Get the order behind a hosted payment session — the success-redirect
/// lookup.
async fn get_order_by_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .find_by_provider_session(&session_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Order for session {session_id}")))?;

    let (order, items) = state
        .services
        .orders
        .get_order(order.id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Order for session {session_id}")))?;

    Ok(success_response(OrderDetail::from_parts(order, items)))
}

// Response DTOs

#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: order::OrderStatus,
    pub currency: String,
    pub total: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(model: order::Model) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            status: model.status,
            currency: model.currency,
            total: model.total,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_number: String,
    pub status: order::OrderStatus,
    pub currency: String,
    pub subtotal: i64,
    pub shipping_cost: i64,
    pub tax: i64,
    pub total: i64,
    pub provider_session_id: Option<String>,
    pub items: Vec<OrderItemView>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl OrderDetail {
    fn from_parts(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            currency: order.currency,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            tax: order.tax,
            total: order.total,
            provider_session_id: order.provider_session_id,
            items: items
                .into_iter()
                .map(|item| OrderItemView {
                    product_id: item.product_id,
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_amount: item.unit_amount,
                })
                .collect(),
            created_at: order.created_at,
        }
    }
}
