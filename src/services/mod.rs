pub mod inventory_items;
pub mod placements;
pub mod product_types;
pub mod serial;
pub mod warehouses;

pub use inventory_items::{InventoryItemService, NewInventoryItem, UpdateInventoryItem};
pub use placements::PlacementLedgerService;
pub use product_types::{NewProductType, ProductTypeService, UpdateProductType};
pub use warehouses::{NewWarehouse, UpdateWarehouse, WarehouseService};
