use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Default status assigned to newly created warehouses. Statuses are free
/// strings so operators can introduce their own lifecycle values.
pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_INACTIVE: &str = "INACTIVE";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub max_capacity: i32,
    /// Sum of placement quantities held here. Mutated only by the placement
    /// ledger, inside the same transaction as the placement rows.
    pub current_capacity: i32,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn available_capacity(&self) -> i32 {
        self.max_capacity - self.current_capacity
    }

    pub fn has_capacity(&self, quantity: i32) -> bool {
        self.available_capacity() >= quantity
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::warehouse_inventory::Entity")]
    WarehouseInventory,
}

impl Related<super::warehouse_inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WarehouseInventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
