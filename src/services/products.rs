use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{product, product_price};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::payments::PaymentGateway;

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub stock: i32,
    pub is_active: bool,
}

/// Input for updating product fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Catalog service: products, stock and per-currency prices, kept in sync
/// with the payment provider's product/price resources.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
}

impl ProductCatalogService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if input.stock < 0 {
            return Err(ServiceError::Validation(
                "Stock cannot be negative".to_string(),
            ));
        }

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            description: Set(input.description),
            stock: Set(input.stock),
            is_active: Set(input.is_active),
            provider_product_id: Set(None),
            ..Default::default()
        };

        let created = model.insert(&*self.db).await?;
        info!(product_id = %created.id, slug = %created.slug, "Product created");
        self.event_sender
            .send(Event::ProductCreated(created.id))
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.require_product(product_id).await?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }

        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    /// Sets the absolute stock level for a product.
    #[instrument(skip(self))]
    pub async fn set_stock(
        &self,
        product_id: Uuid,
        stock: i32,
    ) -> Result<product::Model, ServiceError> {
        if stock < 0 {
            return Err(ServiceError::Validation(
                "Stock cannot be negative".to_string(),
            ));
        }

        let existing = self.require_product(product_id).await?;
        let old_stock = existing.stock;

        let mut active: product::ActiveModel = existing.into();
        active.stock = Set(stock);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send(Event::StockAdjusted {
                product_id,
                old_stock,
                new_stock: stock,
            })
            .await;

        Ok(updated)
    }

    /// Sets the unit price for a product in one currency, provisioning the
    /// provider-side product and price.
    ///
    /// The provider price is created first; the local swap (deactivate old
    /// row, insert new row) runs in one transaction. If the swap fails the
    /// fresh provider price is archived best-effort. The replaced provider
    /// price is archived last, also best-effort — archival failures leave a
    /// stale-but-harmless price behind at the provider.
    #[instrument(skip(self))]
    pub async fn upsert_price(
        &self,
        product_id: Uuid,
        currency: &str,
        unit_amount: i64,
    ) -> Result<product_price::Model, ServiceError> {
        if unit_amount <= 0 {
            return Err(ServiceError::Validation(
                "Unit amount must be positive".to_string(),
            ));
        }
        let currency = currency.to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ServiceError::Validation(
                "Currency must be a 3-letter ISO code".to_string(),
            ));
        }

        let product = self.require_product(product_id).await?;

        let provider_product_id = match &product.provider_product_id {
            Some(id) => id.clone(),
            None => {
                let remote = self.gateway.create_product(&product.name).await?;
                let mut active: product::ActiveModel = product.clone().into();
                active.provider_product_id = Set(Some(remote.id.clone()));
                active.update(&*self.db).await?;
                remote.id
            }
        };

        let new_price = self
            .gateway
            .create_price(&provider_product_id, &currency, unit_amount)
            .await?;

        let previous = product_price::Entity::find()
            .filter(product_price::Column::ProductId.eq(product_id))
            .filter(product_price::Column::Currency.eq(currency.clone()))
            .filter(product_price::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?;

        let swap = self
            .swap_price_rows(product_id, &currency, unit_amount, &new_price.id, &previous)
            .await;

        let created = match swap {
            Ok(created) => created,
            Err(e) => {
                warn!(
                    product_id = %product_id,
                    error = %e,
                    "Failed to record price locally, archiving fresh provider price"
                );
                if let Err(arch_err) = self.gateway.archive_price(&new_price.id).await {
                    warn!(
                        provider_price_id = %new_price.id,
                        error = %arch_err,
                        "Compensating price archival failed"
                    );
                }
                return Err(ServiceError::PersistenceFailure(
                    "Failed to record price".to_string(),
                ));
            }
        };

        if let Some(old) = previous {
            if let Some(old_provider_id) = old.provider_price_id {
                if let Err(e) = self.gateway.archive_price(&old_provider_id).await {
                    warn!(
                        provider_price_id = %old_provider_id,
                        error = %e,
                        "Failed to archive replaced provider price"
                    );
                }
            }
        }

        self.event_sender
            .send(Event::PriceUpdated {
                product_id,
                currency,
            })
            .await;

        Ok(created)
    }

    async fn swap_price_rows(
        &self,
        product_id: Uuid,
        currency: &str,
        unit_amount: i64,
        provider_price_id: &str,
        previous: &Option<product_price::Model>,
    ) -> Result<product_price::Model, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        if let Some(old) = previous {
            let mut active: product_price::ActiveModel = old.clone().into();
            active.is_active = Set(false);
            active.updated_at = Set(Some(now));
            active.update(&txn).await?;
        }

        let created = product_price::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            currency: Set(currency.to_string()),
            unit_amount: Set(unit_amount),
            provider_price_id: Set(Some(provider_price_id.to_string())),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(created)
    }

    /// Gets a product with its active prices, by slug.
    #[instrument(skip(self))]
    pub async fn get_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<(product::Model, Vec<product_price::Model>)>, ServiceError> {
        let Some(product) = product::Entity::find()
            .filter(product::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        let prices = product_price::Entity::find()
            .filter(product_price::Column::ProductId.eq(product.id))
            .filter(product_price::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?;

        Ok(Some((product, prices)))
    }

    /// Lists products, optionally only active ones.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        active_only: bool,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::Validation(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let mut query = product::Entity::find().order_by_asc(product::Column::Name);
        if active_only {
            query = query.filter(product::Column::IsActive.eq(true));
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page - 1).await?;

        Ok((products, total))
    }

    async fn require_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id}")))
    }
}
