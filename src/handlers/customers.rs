use crate::entities::customer;
use crate::errors::ApiError;
use crate::handlers::common::{map_service_error, success_response};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use uuid::Uuid;

/// Creates the router for customer endpoints
pub fn customer_routes() -> Router<AppState> {
    Router::new().route("/by-user/:user_id", get(get_customer_by_user))
}

/// Look up the billing customer for a user. Read-only: provisioning only
/// ever happens inside checkout.
async fn get_customer_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state
        .services
        .customers
        .find_by_user(user_id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Customer for user {user_id}")))?;

    Ok(success_response(CustomerView::from(customer)))
}

#[derive(Debug, Serialize)]
pub struct CustomerView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_customer_id: String,
}

impl From<customer::Model> for CustomerView {
    fn from(model: customer::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            provider_customer_id: model.provider_customer_id,
        }
    }
}
