use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_warehouses_table::Migration),
            Box::new(m20240101_000002_create_product_types_table::Migration),
            Box::new(m20240101_000003_create_inventory_items_table::Migration),
            Box::new(m20240101_000004_create_warehouse_inventory_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_warehouses_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_warehouses_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Matches entities/warehouse.rs
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::Location).string().not_null())
                        .col(ColumnDef::new(Warehouses::MaxCapacity).integer().not_null())
                        .col(
                            ColumnDef::new(Warehouses::CurrentCapacity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Warehouses::Status).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Warehouses::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouses_status")
                        .table(Warehouses::Table)
                        .col(Warehouses::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Warehouses {
        Table,
        Id,
        Name,
        Location,
        MaxCapacity,
        CurrentCapacity,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_product_types_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_product_types_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Matches entities/product_type.rs
            manager
                .create_table(
                    Table::create()
                        .table(ProductTypes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductTypes::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductTypes::Name).string().not_null())
                        .col(ColumnDef::new(ProductTypes::Category).string().not_null())
                        .col(
                            ColumnDef::new(ProductTypes::UnitOfMeasure)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductTypes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("ux_product_types_name")
                        .table(ProductTypes::Table)
                        .col(ProductTypes::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_types_category")
                        .table(ProductTypes::Table)
                        .col(ProductTypes::Category)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductTypes::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum ProductTypes {
        Table,
        Id,
        Name,
        Category,
        UnitOfMeasure,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_inventory_items_table {
    use super::m20240101_000002_create_product_types_table::ProductTypes;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_inventory_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Matches entities/inventory_item.rs
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::SerialNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::ProductTypeId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_items_product_type")
                                .from(InventoryItems::Table, InventoryItems::ProductTypeId)
                                .to(ProductTypes::Table, ProductTypes::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Global serial uniqueness; also the backstop for concurrent
            // serial allocation.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("ux_inventory_items_serial")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::SerialNumber)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_product_type")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::ProductTypeId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum InventoryItems {
        Table,
        Id,
        SerialNumber,
        ProductTypeId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_warehouse_inventory_table {
    use super::m20240101_000001_create_warehouses_table::Warehouses;
    use super::m20240101_000003_create_inventory_items_table::InventoryItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_warehouse_inventory_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Matches entities/warehouse_inventory.rs
            manager
                .create_table(
                    Table::create()
                        .table(WarehouseInventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseInventory::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::InventoryItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseInventory::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warehouse_inventory_warehouse")
                                .from(WarehouseInventory::Table, WarehouseInventory::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_warehouse_inventory_item")
                                .from(
                                    WarehouseInventory::Table,
                                    WarehouseInventory::InventoryItemId,
                                )
                                .to(InventoryItems::Table, InventoryItems::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // The placement uniqueness key: at most one record per
            // (warehouse, item) pair.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .unique()
                        .name("ux_warehouse_inventory_pair")
                        .table(WarehouseInventory::Table)
                        .col(WarehouseInventory::WarehouseId)
                        .col(WarehouseInventory::InventoryItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouse_inventory_item")
                        .table(WarehouseInventory::Table)
                        .col(WarehouseInventory::InventoryItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WarehouseInventory::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum WarehouseInventory {
        Table,
        Id,
        WarehouseId,
        InventoryItemId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}
