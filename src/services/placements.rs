//! The placement ledger.
//!
//! Placement records tie an inventory item to a warehouse with a positive
//! quantity. Every mutation runs inside one transaction and keeps each
//! warehouse's `current_capacity` equal to the sum of its placement
//! quantities. Capacity is claimed with a guarded update (the row is only
//! touched when the increment still fits under `max_capacity`), so two
//! concurrent placements can never jointly overshoot a warehouse. Placement
//! rows get the same treatment: decrements, removals, and absolute writes
//! are guarded by the quantity they were computed from, so a concurrent
//! writer surfaces as a retried conflict instead of a lost update, whatever
//! isolation level the backend runs at.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::entities::{inventory_item, warehouse, warehouse_inventory};
use crate::errors::{is_unique_violation, ServiceError};
use crate::events::{Event, EventSender};

/// Service executing placement ledger operations.
#[derive(Clone)]
pub struct PlacementLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

/// Atomically claims `quantity` units of a warehouse's capacity. Returns
/// false when the warehouse is absent or the increment would exceed
/// `max_capacity`; the caller disambiguates.
pub(crate) async fn claim_capacity<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
    quantity: i32,
) -> Result<bool, ServiceError> {
    let result = warehouse::Entity::update_many()
        .col_expr(
            warehouse::Column::CurrentCapacity,
            Expr::col(warehouse::Column::CurrentCapacity).add(quantity),
        )
        .col_expr(
            warehouse::Column::UpdatedAt,
            Expr::value(Utc::now().fixed_offset()),
        )
        .filter(warehouse::Column::Id.eq(warehouse_id))
        .filter(
            Expr::expr(Expr::col(warehouse::Column::CurrentCapacity).add(quantity))
                .lte(Expr::col(warehouse::Column::MaxCapacity)),
        )
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Returns `quantity` units of capacity to a warehouse. Guarded like the
/// claim: a release may only consume what the counter actually holds, so a
/// stale caller can never drive it negative.
pub(crate) async fn release_capacity<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = warehouse::Entity::update_many()
        .col_expr(
            warehouse::Column::CurrentCapacity,
            Expr::col(warehouse::Column::CurrentCapacity).sub(quantity),
        )
        .col_expr(
            warehouse::Column::UpdatedAt,
            Expr::value(Utc::now().fixed_offset()),
        )
        .filter(warehouse::Column::Id.eq(warehouse_id))
        .filter(warehouse::Column::CurrentCapacity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(ServiceError::InternalError(format!(
            "refused to release {} units from warehouse {}: counter would go negative",
            quantity, warehouse_id
        )));
    }

    Ok(())
}

/// Builds the diagnostic error for a failed capacity claim by re-reading the
/// warehouse row. The read happens after the claim failed, so the reported
/// availability is at least as fresh as the rejection.
async fn capacity_error<C: ConnectionTrait>(
    conn: &C,
    warehouse_id: Uuid,
    requested: i32,
) -> ServiceError {
    match warehouse::Entity::find_by_id(warehouse_id).one(conn).await {
        Ok(Some(wh)) => ServiceError::CapacityExceeded {
            available: wh.available_capacity(),
            warehouse: wh.name,
            requested,
        },
        Ok(None) => ServiceError::not_found("Warehouse", warehouse_id),
        Err(e) => ServiceError::DatabaseError(e),
    }
}

/// Core placement insertion shared by `place` and initial placement during
/// item creation. Runs on the caller's connection (usually a transaction).
pub(crate) async fn insert_placement<C: ConnectionTrait>(
    conn: &C,
    item: &inventory_item::Model,
    warehouse_id: Uuid,
    quantity: i32,
) -> Result<warehouse_inventory::Model, ServiceError> {
    let wh = warehouse::Entity::find_by_id(warehouse_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Warehouse", warehouse_id))?;

    let already_placed = warehouse_inventory::Entity::find()
        .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
        .filter(warehouse_inventory::Column::InventoryItemId.eq(item.id))
        .count(conn)
        .await?
        > 0;
    if already_placed {
        return Err(ServiceError::AlreadyPlaced {
            serial_number: item.serial_number.clone(),
            warehouse: wh.name,
        });
    }

    if !claim_capacity(conn, warehouse_id, quantity).await? {
        return Err(capacity_error(conn, warehouse_id, quantity).await);
    }

    let now = Utc::now().fixed_offset();
    let record = warehouse_inventory::ActiveModel {
        warehouse_id: Set(warehouse_id),
        inventory_item_id: Set(item.id),
        quantity: Set(quantity),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match record.insert(conn).await {
        Ok(model) => Ok(model),
        // Lost a race on the pair index; the transaction rolls back the
        // capacity claim with everything else.
        Err(e) if is_unique_violation(&e) => Err(ServiceError::AlreadyPlaced {
            serial_number: item.serial_number.clone(),
            warehouse: wh.name,
        }),
        Err(e) => Err(ServiceError::DatabaseError(e)),
    }
}

impl PlacementLedgerService {
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

    /// Places a quantity of an existing item into a warehouse.
    #[instrument(skip(self))]
    pub async fn place(
        &self,
        item_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    ) -> Result<warehouse_inventory::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "quantity must be positive".to_string(),
            ));
        }

        let record = db::transaction_with_retry(&self.db_pool, move |txn| {
            Box::pin(async move {
                let item = inventory_item::Entity::find_by_id(item_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Inventory item", item_id))?;

                insert_placement(txn, &item, warehouse_id, quantity).await
            })
        })
        .await?;

        info!(
            %item_id,
            %warehouse_id,
            quantity,
            record_id = record.id,
            "Placed item in warehouse"
        );

        self.send_event(Event::StockPlaced {
            record_id: record.id,
            item_id,
            warehouse_id,
            quantity,
        })
        .await?;

        Ok(record)
    }

    /// Sets a placement record to a new positive quantity, adjusting the
    /// warehouse's capacity by the delta.
    #[instrument(skip(self))]
    pub async fn adjust_quantity(
        &self,
        record_id: i64,
        new_quantity: i32,
    ) -> Result<warehouse_inventory::Model, ServiceError> {
        if new_quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "quantity must be positive; use remove to clear a placement".to_string(),
            ));
        }

        let (updated, old_quantity) =
            db::transaction_with_retry(&self.db_pool, move |txn| {
                Box::pin(async move {
                    let record = warehouse_inventory::Entity::find_by_id(record_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Placement record not found with id: {}",
                                record_id
                            ))
                        })?;

                    let old_quantity = record.quantity;
                    let delta = new_quantity - old_quantity;

                    if delta > 0 {
                        if !claim_capacity(txn, record.warehouse_id, delta).await? {
                            return Err(capacity_error(txn, record.warehouse_id, delta).await);
                        }
                    } else if delta < 0 {
                        release_capacity(txn, record.warehouse_id, -delta).await?;
                    }

                    // The write only lands if the quantity is still the one
                    // the delta was computed from; a concurrent writer forces
                    // a retry with a fresh read.
                    let result = warehouse_inventory::Entity::update_many()
                        .col_expr(warehouse_inventory::Column::Quantity, Expr::value(new_quantity))
                        .col_expr(
                            warehouse_inventory::Column::UpdatedAt,
                            Expr::value(Utc::now().fixed_offset()),
                        )
                        .filter(warehouse_inventory::Column::Id.eq(record_id))
                        .filter(warehouse_inventory::Column::Quantity.eq(old_quantity))
                        .exec(txn)
                        .await?;
                    if result.rows_affected != 1 {
                        return Err(ServiceError::ConcurrentModification(format!(
                            "placement record {} changed while being adjusted",
                            record_id
                        )));
                    }

                    let updated = warehouse_inventory::Entity::find_by_id(record_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::InternalError(format!(
                                "placement record {} missing after update",
                                record_id
                            ))
                        })?;

                    Ok((updated, old_quantity))
                })
            })
            .await?;

        info!(record_id, old_quantity, new_quantity, "Adjusted placement quantity");

        self.send_event(Event::PlacementAdjusted {
            record_id,
            old_quantity,
            new_quantity,
        })
        .await?;

        Ok(updated)
    }

    /// Removes an item from a warehouse entirely, returning the capacity it
    /// occupied.
    #[instrument(skip(self))]
    pub async fn remove(&self, warehouse_id: Uuid, item_id: Uuid) -> Result<(), ServiceError> {
        let quantity = db::transaction_with_retry(&self.db_pool, move |txn| {
            Box::pin(async move {
                let record = warehouse_inventory::Entity::find()
                    .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
                    .filter(warehouse_inventory::Column::InventoryItemId.eq(item_id))
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(
                            "Item not found in specified warehouse".to_string(),
                        )
                    })?;

                let quantity = record.quantity;

                // Deleting by (id, quantity) pins the amount of capacity
                // being released to the row version that was read.
                let deleted = warehouse_inventory::Entity::delete_many()
                    .filter(warehouse_inventory::Column::Id.eq(record.id))
                    .filter(warehouse_inventory::Column::Quantity.eq(quantity))
                    .exec(txn)
                    .await?;
                if deleted.rows_affected != 1 {
                    return Err(ServiceError::ConcurrentModification(format!(
                        "placement record {} changed while being removed",
                        record.id
                    )));
                }

                release_capacity(txn, warehouse_id, quantity).await?;

                Ok(quantity)
            })
        })
        .await?;

        info!(%item_id, %warehouse_id, quantity, "Removed item from warehouse");

        self.send_event(Event::StockRemoved {
            item_id,
            warehouse_id,
            quantity,
        })
        .await?;

        Ok(())
    }

    /// Transfers a quantity of an item between two warehouses atomically:
    /// source and destination mutations commit together or not at all.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        item_id: Uuid,
        source_warehouse_id: Uuid,
        destination_warehouse_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "quantity must be positive".to_string(),
            ));
        }
        if source_warehouse_id == destination_warehouse_id {
            return Err(ServiceError::InvalidInput(
                "cannot transfer stock to the same warehouse".to_string(),
            ));
        }

        db::transaction_with_retry(&self.db_pool, move |txn| {
            Box::pin(async move {
                let source = warehouse_inventory::Entity::find()
                    .filter(warehouse_inventory::Column::WarehouseId.eq(source_warehouse_id))
                    .filter(warehouse_inventory::Column::InventoryItemId.eq(item_id))
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound("Item not found in source warehouse".to_string())
                    })?;

                if source.quantity < quantity {
                    return Err(ServiceError::InsufficientQuantity {
                        available: source.quantity,
                        requested: quantity,
                    });
                }

                let destination_exists = warehouse::Entity::find_by_id(destination_warehouse_id)
                    .count(txn)
                    .await?
                    > 0;
                if !destination_exists {
                    return Err(ServiceError::not_found(
                        "Destination warehouse",
                        destination_warehouse_id,
                    ));
                }

                if !claim_capacity(txn, destination_warehouse_id, quantity).await? {
                    return Err(capacity_error(txn, destination_warehouse_id, quantity).await);
                }

                // Source side: the decrement is guarded by the remaining
                // quantity, so two transfers draining one record can never
                // jointly take out more than it holds. The earlier check
                // only shapes the fast-path diagnostic.
                let drained = warehouse_inventory::Entity::update_many()
                    .col_expr(
                        warehouse_inventory::Column::Quantity,
                        Expr::col(warehouse_inventory::Column::Quantity).sub(quantity),
                    )
                    .col_expr(
                        warehouse_inventory::Column::UpdatedAt,
                        Expr::value(Utc::now().fixed_offset()),
                    )
                    .filter(warehouse_inventory::Column::Id.eq(source.id))
                    .filter(warehouse_inventory::Column::Quantity.gte(quantity))
                    .exec(txn)
                    .await?;
                if drained.rows_affected != 1 {
                    return Err(
                        match warehouse_inventory::Entity::find_by_id(source.id)
                            .one(txn)
                            .await?
                        {
                            Some(fresh) => ServiceError::InsufficientQuantity {
                                available: fresh.quantity,
                                requested: quantity,
                            },
                            None => ServiceError::NotFound(
                                "Item not found in source warehouse".to_string(),
                            ),
                        },
                    );
                }
                release_capacity(txn, source_warehouse_id, quantity).await?;

                // A fully drained record is dropped, never kept at zero.
                warehouse_inventory::Entity::delete_many()
                    .filter(warehouse_inventory::Column::Id.eq(source.id))
                    .filter(warehouse_inventory::Column::Quantity.eq(0))
                    .exec(txn)
                    .await?;

                // Destination side: guarded merge into an existing record,
                // falling back to an insert backstopped by the pair index.
                let merged = warehouse_inventory::Entity::update_many()
                    .col_expr(
                        warehouse_inventory::Column::Quantity,
                        Expr::col(warehouse_inventory::Column::Quantity).add(quantity),
                    )
                    .col_expr(
                        warehouse_inventory::Column::UpdatedAt,
                        Expr::value(Utc::now().fixed_offset()),
                    )
                    .filter(
                        warehouse_inventory::Column::WarehouseId.eq(destination_warehouse_id),
                    )
                    .filter(warehouse_inventory::Column::InventoryItemId.eq(item_id))
                    .exec(txn)
                    .await?;

                if merged.rows_affected == 0 {
                    let now = Utc::now().fixed_offset();
                    let insert = warehouse_inventory::ActiveModel {
                        warehouse_id: Set(destination_warehouse_id),
                        inventory_item_id: Set(item_id),
                        quantity: Set(quantity),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await;

                    match insert {
                        Ok(_) => {}
                        Err(e) if is_unique_violation(&e) => {
                            return Err(ServiceError::ConcurrentModification(format!(
                                "placement of item {} in warehouse {} appeared mid-transfer",
                                item_id, destination_warehouse_id
                            )));
                        }
                        Err(e) => return Err(ServiceError::DatabaseError(e)),
                    }
                }

                Ok(())
            })
        })
        .await?;

        info!(
            %item_id,
            %source_warehouse_id,
            %destination_warehouse_id,
            quantity,
            "Transferred stock between warehouses"
        );

        self.send_event(Event::StockTransferred {
            item_id,
            source_warehouse_id,
            destination_warehouse_id,
            quantity,
        })
        .await?;

        Ok(())
    }

    /// Total quantity of an item across all warehouses. Zero (not an error)
    /// when the item has no placements.
    #[instrument(skip(self))]
    pub async fn aggregate_quantity(&self, item_id: Uuid) -> Result<i64, ServiceError> {
        let total: Option<i64> = warehouse_inventory::Entity::find()
            .select_only()
            .column_as(Expr::col(warehouse_inventory::Column::Quantity).sum(), "total")
            .filter(warehouse_inventory::Column::InventoryItemId.eq(item_id))
            .into_tuple()
            .one(self.db_pool.as_ref())
            .await?
            .flatten();

        Ok(total.unwrap_or(0))
    }

    /// All placement records for an item, in insertion order.
    #[instrument(skip(self))]
    pub async fn locations_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<warehouse_inventory::Model>, ServiceError> {
        warehouse_inventory::Entity::find()
            .filter(warehouse_inventory::Column::InventoryItemId.eq(item_id))
            .order_by_asc(warehouse_inventory::Column::Id)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// All placement records held by a warehouse.
    #[instrument(skip(self))]
    pub async fn items_in_warehouse(
        &self,
        warehouse_id: Uuid,
    ) -> Result<Vec<warehouse_inventory::Model>, ServiceError> {
        warehouse_inventory::Entity::find()
            .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
            .order_by_asc(warehouse_inventory::Column::Id)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Items currently placed in two or more warehouses.
    #[instrument(skip(self))]
    pub async fn items_in_multiple_warehouses(
        &self,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();

        let item_ids: Vec<Uuid> = warehouse_inventory::Entity::find()
            .select_only()
            .column(warehouse_inventory::Column::InventoryItemId)
            .group_by(warehouse_inventory::Column::InventoryItemId)
            .having(
                Expr::expr(Expr::col(warehouse_inventory::Column::Id).count()).gte(2),
            )
            .into_tuple()
            .all(db)
            .await?;

        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        inventory_item::Entity::find()
            .filter(inventory_item::Column::Id.is_in(item_ids))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Whether a placement record exists for the pair.
    #[instrument(skip(self))]
    pub async fn item_exists_in_warehouse(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let count = warehouse_inventory::Entity::find()
            .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
            .filter(warehouse_inventory::Column::InventoryItemId.eq(item_id))
            .count(self.db_pool.as_ref())
            .await?;

        Ok(count > 0)
    }
}
