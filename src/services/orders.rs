use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::{
    customer, order, order_item, product, product_price, shipping_address, order::OrderStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Prefix on every order number.
const ORDER_NUMBER_PREFIX: &str = "BAR";
/// How many fresh numbers to try before giving up on a unique slot.
const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 5;

/// One validated line going into an order.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product: product::Model,
    pub quantity: i32,
}

/// Shipping details captured per order.
#[derive(Debug, Clone)]
pub struct ShippingDetails {
    pub recipient_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Input for order aggregation.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub currency: String,
    pub lines: Vec<OrderLine>,
    pub shipping: ShippingDetails,
}

/// A freshly persisted order together with the price rows that produced it,
/// keyed by product id. The checkout flow needs those rows to build the
/// provider session line items.
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub prices: HashMap<Uuid, product_price::Model>,
}

/// Generates an order number: prefix, UTC timestamp, short random token.
/// Uniqueness is enforced by the index on `orders.order_number`, not by this
/// function.
pub fn generate_order_number() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!(
        "{}-{}-{}",
        ORDER_NUMBER_PREFIX,
        Utc::now().format("%Y%m%d%H%M%S"),
        token.to_uppercase()
    )
}

/// True when a database error is a unique-constraint violation.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Service owning the order aggregate.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Persists an order aggregate for a customer.
    ///
    /// Unit prices are resolved here, at aggregation time, and copied into
    /// the item rows; totals are minor units with shipping and tax fixed at
    /// zero until real calculations land. The shipping address, order and
    /// items are created in one transaction; an order-number collision rolls
    /// the whole attempt back and retries with a fresh number.
    #[instrument(skip(self, customer, draft), fields(customer_id = %customer.id, currency = %draft.currency))]
    pub async fn create_order(
        &self,
        customer: &customer::Model,
        draft: OrderDraft,
    ) -> Result<CreatedOrder, ServiceError> {
        let currency = draft.currency.to_uppercase();

        let product_ids: Vec<Uuid> = draft.lines.iter().map(|l| l.product.id).collect();
        let price_rows = product_price::Entity::find()
            .filter(product_price::Column::ProductId.is_in(product_ids))
            .filter(product_price::Column::Currency.eq(currency.clone()))
            .filter(product_price::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?;

        let prices: HashMap<Uuid, product_price::Model> = price_rows
            .into_iter()
            .map(|p| (p.product_id, p))
            .collect();

        let mut subtotal: i64 = 0;
        for line in &draft.lines {
            let price = prices.get(&line.product.id).ok_or_else(|| {
                ServiceError::ProductUnavailable(format!(
                    "Product \"{}\" in {}",
                    line.product.name, currency
                ))
            })?;
            subtotal += price.unit_amount * i64::from(line.quantity);
        }

        // Placeholders until shipping rates and tax rules are modelled.
        let shipping_cost: i64 = 0;
        let tax: i64 = 0;
        let total = subtotal + shipping_cost + tax;

        for attempt in 1..=MAX_ORDER_NUMBER_ATTEMPTS {
            let order_number = generate_order_number();
            match self
                .persist_order(
                    customer,
                    &draft,
                    &currency,
                    &prices,
                    &order_number,
                    subtotal,
                    shipping_cost,
                    tax,
                    total,
                )
                .await
            {
                Ok(created) => {
                    info!(
                        order_id = %created.order.id,
                        order_number = %created.order.order_number,
                        total = total,
                        "Order created"
                    );
                    self.event_sender
                        .send(Event::OrderCreated(created.order.id))
                        .await;
                    return Ok(created);
                }
                Err(ServiceError::Database(db_err)) if is_unique_violation(&db_err) => {
                    warn!(
                        attempt = attempt,
                        order_number = %order_number,
                        "Order number collision, regenerating"
                    );
                }
                Err(other) => return Err(other),
            }
        }

        Err(ServiceError::PersistenceFailure(
            "Could not allocate a unique order number".to_string(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_order(
        &self,
        customer: &customer::Model,
        draft: &OrderDraft,
        currency: &str,
        prices: &HashMap<Uuid, product_price::Model>,
        order_number: &str,
        subtotal: i64,
        shipping_cost: i64,
        tax: i64,
        total: i64,
    ) -> Result<CreatedOrder, ServiceError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let address = shipping_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            recipient_name: Set(draft.shipping.recipient_name.clone()),
            line1: Set(draft.shipping.line1.clone()),
            line2: Set(draft.shipping.line2.clone()),
            city: Set(draft.shipping.city.clone()),
            postal_code: Set(draft.shipping.postal_code.clone()),
            country: Set(draft.shipping.country.clone()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.to_string()),
            customer_id: Set(customer.id),
            status: Set(OrderStatus::Pending),
            currency: Set(currency.to_string()),
            subtotal: Set(subtotal),
            shipping_cost: Set(shipping_cost),
            tax: Set(tax),
            total: Set(total),
            shipping_address_id: Set(address.id),
            provider_session_id: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            // Checked during subtotal computation, so present here.
            let price = prices.get(&line.product.id).ok_or_else(|| {
                ServiceError::ProductUnavailable(format!(
                    "Product \"{}\" in {}",
                    line.product.name, currency
                ))
            })?;

            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product.id),
                product_name: Set(line.product.name.clone()),
                quantity: Set(line.quantity),
                unit_amount: Set(price.unit_amount),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;

        Ok(CreatedOrder {
            order,
            items,
            prices: prices.clone(),
        })
    }

    /// Back-fills the provider session id after session creation succeeded.
    #[instrument(skip(self))]
    pub async fn set_provider_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id}")))?;

        let mut active: order::ActiveModel = order.into();
        active.provider_session_id = Set(Some(session_id.to_string()));
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }

    /// Moves an order to a new status through the transition table.
    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id}")))?;

        let current = order.status;
        if !current.can_transition_to(next) {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} cannot move from {} to {}",
                order_id,
                current.as_str(),
                next.as_str()
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(next);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: current.as_str().to_string(),
                new_status: next.as_str().to_string(),
            })
            .await;

        Ok(updated)
    }

    /// Gets an order with its items.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        let Some(order) = order::Entity::find_by_id(order_id).one(&*self.db).await? else {
            return Ok(None);
        };

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        Ok(Some((order, items)))
    }

    /// Looks an order up by its hosted payment session id — the
    /// success-redirect path.
    #[instrument(skip(self))]
    pub async fn find_by_provider_session(
        &self,
        session_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let order = order::Entity::find()
            .filter(order::Column::ProviderSessionId.eq(session_id))
            .one(&*self.db)
            .await?;
        Ok(order)
    }

    /// Lists orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::Validation(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let paginator = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok((orders, total))
    }
}
