use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::instrument;
use uuid::Uuid;

use crate::cart::CartLine;
use crate::entities::product;
use crate::errors::ServiceError;

/// Validates requested quantities against recorded stock.
///
/// Runs on the caller's transaction so every product row is read from one
/// consistent snapshot. The check is read-only: it neither decrements stock
/// nor holds a lock, so two concurrent checkouts can both pass against the
/// same units and oversell. Known gap; the candidate fixes (conditional
/// decrement in the order transaction, or a reservation ledger) are recorded
/// in DESIGN.md.
///
/// Returns the resolved products in first-occurrence order; the result length
/// equals the number of distinct requested product ids.
#[instrument(skip(conn, lines), fields(line_count = lines.len()))]
pub async fn validate_stock<C>(
    conn: &C,
    lines: &[CartLine],
) -> Result<Vec<product::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    if lines.is_empty() {
        return Err(ServiceError::Validation("Cart is empty".to_string()));
    }

    // Aggregate repeated lines per product, preserving first-occurrence order.
    let mut requested: Vec<(Uuid, i32)> = Vec::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::Validation(format!(
                "Quantity for product {} must be positive",
                line.product_id
            )));
        }
        match requested.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => requested.push((line.product_id, line.quantity)),
        }
    }

    let ids: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
    let rows = product::Entity::find()
        .filter(product::Column::Id.is_in(ids))
        .all(conn)
        .await?;

    let mut by_id: HashMap<Uuid, product::Model> = rows
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut resolved = Vec::with_capacity(requested.len());
    for (product_id, quantity) in requested {
        let product = by_id
            .remove(&product_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id}")))?;

        if !product.is_active {
            return Err(ServiceError::ProductUnavailable(format!(
                "Product \"{}\"",
                product.name
            )));
        }

        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock {
                product: product.name,
                requested: quantity,
                available: product.stock,
            });
        }

        resolved.push(product);
    }

    Ok(resolved)
}
