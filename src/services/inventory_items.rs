//! Inventory item registry: trackable item identity.
//!
//! Items are identified by a globally unique serial number, caller-supplied
//! or allocated in the same transaction as the insert. An item may exist
//! without any placement; stock only enters warehouses through the placement
//! ledger.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::entities::{inventory_item, product_type, warehouse_inventory};
use crate::errors::{is_unique_violation, ServiceError};
use crate::events::{Event, EventSender};
use crate::services::{placements, serial};

/// Attempts at item creation when a generated serial loses the uniqueness
/// race against a concurrent creation.
const MAX_CREATE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInventoryItem {
    pub product_type_id: Uuid,

    /// When omitted, a serial number is generated from the product type
    /// category.
    #[validate(length(min = 1, message = "Serial number cannot be empty"))]
    pub serial_number: Option<String>,

    /// Optional initial placement; both fields or neither.
    pub initial_warehouse_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Initial quantity must be at least 1"))]
    pub initial_quantity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateInventoryItem {
    /// The only mutable field; serial numbers are immutable once assigned.
    pub product_type_id: Option<Uuid>,
}

/// Service for managing inventory items
#[derive(Clone)]
pub struct InventoryItemService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryItemService {
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

    /// Creates an inventory item, allocating a serial number when none is
    /// supplied, and optionally placing it into a warehouse in the same
    /// transaction. A generated serial that loses the uniqueness race is
    /// retried a bounded number of times with a fresh allocation.
    #[instrument(skip(self))]
    pub async fn create_item(
        &self,
        input: NewInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        if input.initial_warehouse_id.is_some() != input.initial_quantity.is_some() {
            return Err(ServiceError::InvalidInput(
                "initial_warehouse_id and initial_quantity must be supplied together".to_string(),
            ));
        }

        let generated = input.serial_number.is_none();
        let mut attempt = 0u32;

        let (item, placement) = loop {
            attempt += 1;

            let input = input.clone();
            let result = db::transaction_with_retry(&self.db_pool, move |txn| {
                let input = input.clone();
                Box::pin(async move {
                    let pt = product_type::Entity::find_by_id(input.product_type_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::not_found("Product type", input.product_type_id)
                        })?;

                    let serial_number = match &input.serial_number {
                        Some(serial) => {
                            let taken = inventory_item::Entity::find()
                                .filter(
                                    inventory_item::Column::SerialNumber.eq(serial.as_str()),
                                )
                                .count(txn)
                                .await?
                                > 0;
                            if taken {
                                return Err(ServiceError::DuplicateSerial(serial.clone()));
                            }
                            serial.clone()
                        }
                        None => serial::generate(txn, &pt).await?,
                    };

                    let now = Utc::now().fixed_offset();
                    let item = inventory_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        serial_number: Set(serial_number.clone()),
                        product_type_id: Set(pt.id),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };

                    let item = match item.insert(txn).await {
                        Ok(model) => model,
                        Err(e) if is_unique_violation(&e) => {
                            return Err(ServiceError::DuplicateSerial(serial_number));
                        }
                        Err(e) => return Err(ServiceError::DatabaseError(e)),
                    };

                    let placement = match (input.initial_warehouse_id, input.initial_quantity)
                    {
                        (Some(warehouse_id), Some(quantity)) => Some(
                            placements::insert_placement(txn, &item, warehouse_id, quantity)
                                .await?,
                        ),
                        _ => None,
                    };

                    Ok((item, placement))
                })
            })
            .await;

            match result {
                Ok(created) => break created,
                Err(ServiceError::DuplicateSerial(serial))
                    if generated && attempt < MAX_CREATE_ATTEMPTS =>
                {
                    warn!(
                        %serial,
                        attempt,
                        "Generated serial lost uniqueness race; reallocating"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        info!(item_id = %item.id, serial_number = %item.serial_number, "Created inventory item");

        self.send_event(Event::ItemCreated {
            item_id: item.id,
            serial_number: item.serial_number.clone(),
        })
        .await?;

        if let Some(record) = placement {
            self.send_event(Event::StockPlaced {
                record_id: record.id,
                item_id: item.id,
                warehouse_id: record.warehouse_id,
                quantity: record.quantity,
            })
            .await?;
        }

        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, id: Uuid) -> Result<inventory_item::Model, ServiceError> {
        inventory_item::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("Inventory item", id))
    }

    #[instrument(skip(self))]
    pub async fn get_item_by_serial(
        &self,
        serial_number: &str,
    ) -> Result<inventory_item::Model, ServiceError> {
        inventory_item::Entity::find()
            .filter(inventory_item::Column::SerialNumber.eq(serial_number))
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Inventory item not found with serial number: {}",
                    serial_number
                ))
            })
    }

    #[instrument(skip(self))]
    pub async fn list_items(&self) -> Result<Vec<inventory_item::Model>, ServiceError> {
        inventory_item::Entity::find()
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_items_by_product_type(
        &self,
        product_type_id: Uuid,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        inventory_item::Entity::find()
            .filter(inventory_item::Column::ProductTypeId.eq(product_type_id))
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Substring search over serial numbers.
    #[instrument(skip(self))]
    pub async fn search_items(
        &self,
        term: &str,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        inventory_item::Entity::find()
            .filter(inventory_item::Column::SerialNumber.contains(term))
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Items with no placement records anywhere. A valid state, not an
    /// error: items exist before (and after) they occupy a warehouse.
    #[instrument(skip(self))]
    pub async fn items_without_location(
        &self,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        let placed_ids: Vec<Uuid> = warehouse_inventory::Entity::find()
            .select_only()
            .column(warehouse_inventory::Column::InventoryItemId)
            .group_by(warehouse_inventory::Column::InventoryItemId)
            .into_tuple()
            .all(db)
            .await?;

        let mut query = inventory_item::Entity::find();
        if !placed_ids.is_empty() {
            query = query.filter(inventory_item::Column::Id.is_not_in(placed_ids));
        }

        query
            .order_by_asc(inventory_item::Column::SerialNumber)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Updates the item's product type reference. Serial numbers are
    /// immutable and never touched here.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        id: Uuid,
        input: UpdateInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let existing = inventory_item::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Inventory item", id))?;

        let mut active = existing.into_active_model();
        if let Some(product_type_id) = input.product_type_id {
            product_type::Entity::find_by_id(product_type_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Product type", product_type_id))?;
            active.product_type_id = Set(product_type_id);
        }
        active.updated_at = Set(Utc::now().fixed_offset());

        let updated = active.update(db).await?;

        info!(item_id = %id, "Updated inventory item");
        self.send_event(Event::ItemUpdated(id)).await?;

        Ok(updated)
    }

    /// Deletes an item, explicitly cascading to its placement records: each
    /// referenced warehouse gets the occupied capacity back in the same
    /// transaction, leaving no orphans.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: Uuid) -> Result<(), ServiceError> {
        let placements_removed = db::transaction_with_retry(&self.db_pool, move |txn| {
            Box::pin(async move {
                let item = inventory_item::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Inventory item", id))?;

                let records = warehouse_inventory::Entity::find()
                    .filter(warehouse_inventory::Column::InventoryItemId.eq(id))
                    .all(txn)
                    .await?;

                // Each record is deleted by (id, quantity) so the capacity
                // returned matches the row version that was read; a
                // concurrent writer forces a retry with fresh reads.
                let mut deleted = 0u64;
                for record in &records {
                    let removed = warehouse_inventory::Entity::delete_many()
                        .filter(warehouse_inventory::Column::Id.eq(record.id))
                        .filter(warehouse_inventory::Column::Quantity.eq(record.quantity))
                        .exec(txn)
                        .await?
                        .rows_affected;
                    if removed != 1 {
                        return Err(ServiceError::ConcurrentModification(format!(
                            "placement record {} changed while its item was being deleted",
                            record.id
                        )));
                    }
                    placements::release_capacity(txn, record.warehouse_id, record.quantity)
                        .await?;
                    deleted += 1;
                }

                inventory_item::Entity::delete_by_id(item.id).exec(txn).await?;

                Ok(deleted)
            })
        })
        .await?;

        info!(item_id = %id, placements_removed, "Deleted inventory item");

        self.send_event(Event::ItemDeleted {
            item_id: id,
            placements_removed,
        })
        .await?;

        Ok(())
    }
}
