pub mod inventory_item;
pub mod product_type;
pub mod warehouse;
pub mod warehouse_inventory;
