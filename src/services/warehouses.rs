//! Warehouse registry: identity and capacity metadata.
//!
//! Capacity *accounting* belongs to the placement ledger; this service only
//! guards the metadata edits that could corrupt it, in particular shrinking
//! `max_capacity` below the stock a warehouse already holds.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::entities::{warehouse, warehouse_inventory};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewWarehouse {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Location cannot be empty"))]
    pub location: String,

    #[validate(range(min = 0, message = "Max capacity cannot be negative"))]
    pub max_capacity: i32,

    /// Defaults to ACTIVE when omitted.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateWarehouse {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "Location cannot be empty"))]
    pub location: Option<String>,

    pub status: Option<String>,

    #[validate(range(min = 0, message = "Max capacity cannot be negative"))]
    pub max_capacity: Option<i32>,
}

/// Service for managing warehouses
#[derive(Clone)]
pub struct WarehouseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl WarehouseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }

    /// Creates a warehouse with an empty capacity ledger.
    #[instrument(skip(self))]
    pub async fn create_warehouse(
        &self,
        input: NewWarehouse,
    ) -> Result<warehouse::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        let now = Utc::now().fixed_offset();
        let model = warehouse::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            location: Set(input.location),
            max_capacity: Set(input.max_capacity),
            current_capacity: Set(0),
            status: Set(input
                .status
                .unwrap_or_else(|| warehouse::STATUS_ACTIVE.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db_pool.as_ref())
        .await?;

        info!(warehouse_id = %model.id, name = %model.name, "Created warehouse");
        self.send_event(Event::WarehouseCreated(model.id)).await?;

        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_warehouse(&self, id: Uuid) -> Result<warehouse::Model, ServiceError> {
        warehouse::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("Warehouse", id))
    }

    #[instrument(skip(self))]
    pub async fn list_warehouses(&self) -> Result<Vec<warehouse::Model>, ServiceError> {
        warehouse::Entity::find()
            .order_by_asc(warehouse::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_warehouses_by_status(
        &self,
        status: &str,
    ) -> Result<Vec<warehouse::Model>, ServiceError> {
        warehouse::Entity::find()
            .filter(warehouse::Column::Status.eq(status))
            .order_by_asc(warehouse::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Updates warehouse metadata. Lowering `max_capacity` below the stock
    /// currently held is rejected with `CapacityExceeded`; the check and the
    /// write are one guarded update so a concurrent placement cannot slip
    /// between them.
    #[instrument(skip(self))]
    pub async fn update_warehouse(
        &self,
        id: Uuid,
        input: UpdateWarehouse,
    ) -> Result<warehouse::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        let updated = db::transaction_with_retry(&self.db_pool, move |txn| {
            let input = input.clone();
            Box::pin(async move {
                let existing = warehouse::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Warehouse", id))?;

                if let Some(new_max) = input.max_capacity {
                    let result = warehouse::Entity::update_many()
                        .col_expr(warehouse::Column::MaxCapacity, Expr::value(new_max))
                        .filter(warehouse::Column::Id.eq(id))
                        .filter(warehouse::Column::CurrentCapacity.lte(new_max))
                        .exec(txn)
                        .await?;

                    // Field semantics match the placement path: `available`
                    // is the room on offer (the proposed maximum),
                    // `requested` the room the stock already held needs.
                    if result.rows_affected == 0 {
                        return Err(ServiceError::CapacityExceeded {
                            warehouse: existing.name,
                            available: new_max,
                            requested: existing.current_capacity,
                        });
                    }
                }

                let mut active = existing.into_active_model();
                if let Some(name) = input.name {
                    active.name = Set(name);
                }
                if let Some(location) = input.location {
                    active.location = Set(location);
                }
                if let Some(status) = input.status {
                    active.status = Set(status);
                }
                active.updated_at = Set(Utc::now().fixed_offset());

                active.update(txn).await.map_err(ServiceError::DatabaseError)
            })
        })
        .await?;

        info!(warehouse_id = %id, "Updated warehouse");
        self.send_event(Event::WarehouseUpdated(id)).await?;

        Ok(updated)
    }

    /// Deletes a warehouse. Refused while placement records still reference
    /// it; callers must empty the warehouse first.
    #[instrument(skip(self))]
    pub async fn delete_warehouse(&self, id: Uuid) -> Result<(), ServiceError> {
        db::transaction_with_retry(&self.db_pool, move |txn| {
            Box::pin(async move {
                let existing = warehouse::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Warehouse", id))?;

                let placements = warehouse_inventory::Entity::find()
                    .filter(warehouse_inventory::Column::WarehouseId.eq(id))
                    .count(txn)
                    .await?;
                if placements > 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Warehouse '{}' still holds stock in {} placement(s); remove or transfer it first",
                        existing.name, placements
                    )));
                }

                warehouse::Entity::delete_by_id(id).exec(txn).await?;
                Ok(())
            })
        })
        .await?;

        info!(warehouse_id = %id, "Deleted warehouse");
        self.send_event(Event::WarehouseDeleted(id)).await?;

        Ok(())
    }
}
