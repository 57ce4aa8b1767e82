use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::entities::{customer, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::payments::PaymentGateway;

/// Service resolving shop users to billing customers.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: EventSender,
}

impl CustomerService {
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

    /// Returns the billing customer for a user, provisioning one lazily on
    /// first use.
    ///
    /// Provisioning creates the provider-side customer first and the local
    /// row second. If the local insert fails the provider resource is
    /// deleted best-effort; a failed compensation is logged and swallowed so
    /// the caller only ever sees the generic persistence error.
    #[instrument(skip(self))]
    pub async fn resolve_for_user(&self, user_id: Uuid) -> Result<customer::Model, ServiceError> {
        let db = &*self.db;

        if let Some(existing) = customer::Entity::find()
            .filter(customer::Column::UserId.eq(user_id))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let user = user::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id}")))?;

        let remote = self.gateway.create_customer(&user.email, &user.name).await?;

        let model = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            provider_customer_id: Set(remote.id.clone()),
            created_at: Set(Utc::now()),
        };

        match model.insert(db).await {
            Ok(created) => {
                info!(
                    customer_id = %created.id,
                    provider_customer_id = %remote.id,
                    "Provisioned billing customer"
                );
                self.event_sender
                    .send(Event::CustomerProvisioned(created.id))
                    .await;
                Ok(created)
            }
            Err(e) => {
                error!(
                    user_id = %user_id,
                    error = %e,
                    "Failed to persist customer after provider creation"
                );
                if let Err(del_err) = self.gateway.delete_customer(&remote.id).await {
                    warn!(
                        provider_customer_id = %remote.id,
                        error = %del_err,
                        "Compensating customer delete failed; provider resource is orphaned"
                    );
                }
                Err(ServiceError::PersistenceFailure(
                    "Failed to create customer".to_string(),
                ))
            }
        }
    }

    /// Looks up a customer without provisioning.
    #[instrument(skip(self))]
    pub async fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<customer::Model>, ServiceError> {
        let customer = customer::Entity::find()
            .filter(customer::Column::UserId.eq(user_id))
            .one(&*self.db)
            .await?;
        Ok(customer)
    }
}
