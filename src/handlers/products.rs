use crate::entities::{product, product_price};
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
};
use crate::services::products::{CreateProductInput, UpdateProductInput};
use crate::AppState;
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for catalog endpoints
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/by-slug/:slug", get(get_product_by_slug))
        .route("/:id", put(update_product))
        .route("/:id/stock", put(set_stock))
        .route("/:id/price", put(upsert_price))
}

/// Create a product
async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(CreateProductInput {
            name: payload.name,
            slug: payload.slug,
            description: payload.description,
            stock: payload.stock,
            is_active: payload.is_active,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ProductView::from(product)))
}

/// List products
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .catalog
        .list_products(query.active_only, query.page, query.per_page)
        .await
        .map_err(map_service_error)?;

    let data: Vec<ProductView> = products.into_iter().map(ProductView::from).collect();
    Ok(success_response(PaginatedResponse::new(
        data,
        query.page,
        query.per_page,
        total,
    )))
}

/// Get a product with its active prices
async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (product, prices) = state
        .services
        .catalog
        .get_by_slug(&slug)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Product \"{slug}\"")))?;

    Ok(success_response(ProductDetail::from_parts(product, prices)))
}

/// Update product fields
async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .update_product(
            id,
            UpdateProductInput {
                name: payload.name,
                description: payload.description.map(Some),
                is_active: payload.is_active,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductView::from(product)))
}

/// Set the absolute stock level
async fn set_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .set_stock(id, payload.stock)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ProductView::from(product)))
}

/// Set the unit price in one currency, syncing the payment provider
async fn upsert_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpsertPriceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let price = state
        .services
        .catalog
        .upsert_price(id, &payload.currency, payload.unit_amount)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PriceView::from(price)))
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub slug: String,
    pub description: Option<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertPriceRequest {
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    #[validate(range(min = 1, message = "Unit amount must be positive"))]
    pub unit_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub active_only: bool,
    #[serde(default = "default_list_page")]
    pub page: u64,
    #[serde(default = "default_list_per_page")]
    pub per_page: u64,
}

fn default_list_page() -> u64 {
    1
}

fn default_list_per_page() -> u64 {
    20
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub stock: i32,
    pub is_active: bool,
}

impl From<product::Model> for ProductView {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            stock: model.stock,
            is_active: model.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PriceView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub currency: String,
    pub unit_amount: i64,
}

impl From<product_price::Model> for PriceView {
    fn from(model: product_price::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            currency: model.currency,
            unit_amount: model.unit_amount,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductView,
    pub prices: Vec<PriceView>,
}

impl ProductDetail {
    fn from_parts(product: product::Model, prices: Vec<product_price::Model>) -> Self {
        Self {
            product: ProductView::from(product),
            prices: prices.into_iter().map(PriceView::from).collect(),
        }
    }
}
