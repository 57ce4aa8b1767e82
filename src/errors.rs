use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

/// JSON error body returned by non-checkout endpoints.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g. "Not Found", "Unprocessable Entity")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Errors produced by the service layer.
///
/// The first five variants are the checkout error taxonomy; the rest are
/// ambient conditions every service can hit.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::error::DbErr),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is not available")]
    ProductUnavailable(String),

    #[error("Insufficient stock for \"{product}\". Available: {available}")]
    InsufficientStock {
        product: String,
        requested: i32,
        available: i32,
    },

    #[error("Payment provider error: {0}")]
    ExternalService(String),

    #[error("{0}")]
    PersistenceFailure(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_category(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Service(err) => match err {
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
                ServiceError::ProductUnavailable(_)
                | ServiceError::InsufficientStock { .. }
                | ServiceError::InvalidOperation(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "Unprocessable Entity")
                }
                ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
                ServiceError::ExternalService(_) => (StatusCode::BAD_GATEWAY, "Bad Gateway"),
                ServiceError::Database(_) | ServiceError::PersistenceFailure(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                ),
            },
            ApiError::Validation(_) | ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "Bad Request")
            }
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, category) = self.status_and_category();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, %message, "request failed");
        }

        let body = ErrorResponse {
            error: category.to_string(),
            message,
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
