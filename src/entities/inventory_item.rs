use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Globally unique, immutable once assigned. Either caller-supplied or
    /// produced by the serial number allocator.
    #[sea_orm(unique)]
    pub serial_number: String,
    pub product_type_id: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_type::Entity",
        from = "Column::ProductTypeId",
        to = "super::product_type::Column::Id"
    )]
    ProductType,
    #[sea_orm(has_many = "super::warehouse_inventory::Entity")]
    WarehouseInventory,
}

impl Related<super::product_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductType.def()
    }
}

impl Related<super::warehouse_inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WarehouseInventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
