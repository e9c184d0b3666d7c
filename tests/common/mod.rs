#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use sea_orm::sea_query::Expr;
use stockledger_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{inventory_item, warehouse, warehouse_inventory},
    events::{self, EventSender},
    services::{NewInventoryItem, NewProductType, NewWarehouse},
    AppServices, AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Helper harness for spinning up an application state backed by an
/// in-memory SQLite database.
///
/// The pool is pinned to a single connection: each pooled connection to
/// `sqlite::memory:` would otherwise get its own private database.
pub struct TestApp {
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let cfg = AppConfig::new("sqlite::memory:", "test");

        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        Self {
            state,
            _event_task: event_task,
        }
    }

    pub fn services(&self) -> &AppServices {
        &self.state.services
    }

    /// Seed a warehouse with the given capacity, ACTIVE by default.
    pub async fn seed_warehouse(&self, name: &str, max_capacity: i32) -> warehouse::Model {
        self.services()
            .warehouses
            .create_warehouse(NewWarehouse {
                name: name.to_string(),
                location: format!("{} Test Site", name),
                max_capacity,
                status: None,
            })
            .await
            .expect("seed warehouse for tests")
    }

    /// Seed a product type; serials generated for it use the category prefix.
    pub async fn seed_product_type(
        &self,
        name: &str,
        category: &str,
    ) -> stockledger_api::entities::product_type::Model {
        self.services()
            .product_types
            .create_product_type(NewProductType {
                name: name.to_string(),
                category: category.to_string(),
                unit_of_measure: "unit".to_string(),
            })
            .await
            .expect("seed product type for tests")
    }

    /// Seed an item with a generated serial and no placement.
    pub async fn seed_item(&self, product_type_id: Uuid) -> inventory_item::Model {
        self.services()
            .inventory_items
            .create_item(NewInventoryItem {
                product_type_id,
                serial_number: None,
                initial_warehouse_id: None,
                initial_quantity: None,
            })
            .await
            .expect("seed inventory item for tests")
    }

    /// Re-read a warehouse row directly from the store.
    pub async fn warehouse_row(&self, id: Uuid) -> warehouse::Model {
        warehouse::Entity::find_by_id(id)
            .one(self.state.db.as_ref())
            .await
            .expect("query warehouse")
            .expect("warehouse row should exist")
    }

    /// Asserts that a warehouse's capacity counter equals the sum of its
    /// placement quantities.
    pub async fn assert_capacity_consistent(&self, warehouse_id: Uuid) {
        let wh = self.warehouse_row(warehouse_id).await;

        let placed: Option<i64> = warehouse_inventory::Entity::find()
            .select_only()
            .column_as(
                Expr::col(warehouse_inventory::Column::Quantity).sum(),
                "total",
            )
            .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
            .into_tuple()
            .one(self.state.db.as_ref())
            .await
            .expect("sum placements")
            .flatten();

        assert_eq!(
            wh.current_capacity as i64,
            placed.unwrap_or(0),
            "warehouse '{}' capacity counter diverged from its placements",
            wh.name
        );
    }

    pub async fn placement_count(&self, warehouse_id: Uuid) -> u64 {
        warehouse_inventory::Entity::find()
            .filter(warehouse_inventory::Column::WarehouseId.eq(warehouse_id))
            .count(self.state.db.as_ref())
            .await
            .expect("count placements")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
