//! Stock Ledger Library
//!
//! This crate provides warehouse stock placement tracking: a registry of
//! warehouses and product types, serial-numbered inventory items, and a
//! transactional placement ledger that accounts for warehouse capacity.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;

/// Aggregate of all domain services, sharing one pool and one event channel.
#[derive(Clone)]
pub struct AppServices {
    pub warehouses: Arc<services::WarehouseService>,
    pub product_types: Arc<services::ProductTypeService>,
    pub inventory_items: Arc<services::InventoryItemService>,
    pub placements: Arc<services::PlacementLedgerService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            warehouses: Arc::new(services::WarehouseService::new(
                db.clone(),
                event_sender.clone(),
            )),
            product_types: Arc::new(services::ProductTypeService::new(
                db.clone(),
                event_sender.clone(),
            )),
            inventory_items: Arc::new(services::InventoryItemService::new(
                db.clone(),
                event_sender.clone(),
            )),
            placements: Arc::new(services::PlacementLedgerService::new(db, event_sender)),
        }
    }
}

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::services::*;
    pub use crate::{AppServices, AppState};
}
