use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted after a mutation commits.
///
/// These are in-process notifications for interested consumers (projections,
/// alerting, cache invalidation). They are not persisted and carry no
/// ordering guarantee beyond channel order; current state always lives in the
/// store, never in the event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Warehouse registry events
    WarehouseCreated(Uuid),
    WarehouseUpdated(Uuid),
    WarehouseDeleted(Uuid),

    // Product catalog events
    ProductTypeCreated(Uuid),
    ProductTypeUpdated(Uuid),
    ProductTypeDeleted(Uuid),

    // Inventory item events
    ItemCreated {
        item_id: Uuid,
        serial_number: String,
    },
    ItemUpdated(Uuid),
    ItemDeleted {
        item_id: Uuid,
        placements_removed: u64,
    },

    // Placement ledger events
    StockPlaced {
        record_id: i64,
        item_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    },
    PlacementAdjusted {
        record_id: i64,
        old_quantity: i32,
        new_quantity: i32,
    },
    StockRemoved {
        item_id: Uuid,
        warehouse_id: Uuid,
        quantity: i32,
    },
    StockTransferred {
        item_id: Uuid,
        source_warehouse_id: Uuid,
        destination_warehouse_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes events from the channel until all senders drop.
///
/// Spawn this once at startup (or in a test harness) alongside the
/// `EventSender` handed to services.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockPlaced {
                record_id,
                item_id,
                warehouse_id,
                quantity,
            } => {
                info!(
                    record_id,
                    %item_id,
                    %warehouse_id,
                    quantity,
                    "Stock placed"
                );
            }
            Event::StockTransferred {
                item_id,
                source_warehouse_id,
                destination_warehouse_id,
                quantity,
            } => {
                info!(
                    %item_id,
                    %source_warehouse_id,
                    %destination_warehouse_id,
                    quantity,
                    "Stock transferred"
                );
            }
            Event::PlacementAdjusted {
                record_id,
                old_quantity,
                new_quantity,
            } => {
                info!(record_id, old_quantity, new_quantity, "Placement adjusted");
            }
            Event::ItemDeleted {
                item_id,
                placements_removed,
            } if *placements_removed > 0 => {
                warn!(
                    %item_id,
                    placements_removed,
                    "Deleted item still had stock placed; placements were cascaded"
                );
            }
            other => match serde_json::to_string(other) {
                Ok(payload) => info!(event = %payload, "Received event"),
                Err(e) => warn!("Failed to serialize event for logging: {}", e),
            },
        }
    }

    info!("Event processing loop terminated");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let warehouse_id = Uuid::new_v4();
        sender
            .send(Event::WarehouseCreated(warehouse_id))
            .await
            .expect("send should succeed while receiver is alive");

        match rx.recv().await {
            Some(Event::WarehouseCreated(id)) => assert_eq!(id, warehouse_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::WarehouseDeleted(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
