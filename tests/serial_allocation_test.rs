mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use common::TestApp;
use stockledger_api::errors::ServiceError;
use stockledger_api::services::NewInventoryItem;

#[tokio::test]
async fn generated_serials_use_category_prefix_and_advance() {
    let app = TestApp::new().await;
    let pt = app.seed_product_type("Television", "Electronics").await;

    let first = app.seed_item(pt.id).await;
    let second = app.seed_item(pt.id).await;

    assert_eq!(first.serial_number, "ELE-001");
    assert_eq!(second.serial_number, "ELE-002");
}

#[tokio::test]
async fn short_category_prefixes_are_used_whole() {
    let app = TestApp::new().await;
    let pt = app.seed_product_type("Flatscreen", "tv").await;

    let item = app.seed_item(pt.id).await;
    assert_eq!(item.serial_number, "TV-001");
}

#[tokio::test]
async fn generation_skips_over_taken_serials() {
    let app = TestApp::new().await;
    let pt = app.seed_product_type("Television", "Electronics").await;

    // Claim the serial the generator would otherwise produce next.
    app.services()
        .inventory_items
        .create_item(NewInventoryItem {
            product_type_id: pt.id,
            serial_number: Some("ELE-002".to_string()),
            initial_warehouse_id: None,
            initial_quantity: None,
        })
        .await
        .expect("explicit serial");

    let first = app.seed_item(pt.id).await;
    let second = app.seed_item(pt.id).await;

    assert_eq!(first.serial_number, "ELE-003");
    assert_eq!(second.serial_number, "ELE-004");
}

#[tokio::test]
async fn explicit_serial_collision_is_rejected() {
    let app = TestApp::new().await;
    let electronics = app.seed_product_type("Television", "Electronics").await;
    let furniture = app.seed_product_type("Desk", "Furniture").await;

    app.services()
        .inventory_items
        .create_item(NewInventoryItem {
            product_type_id: electronics.id,
            serial_number: Some("UNIT-42".to_string()),
            initial_warehouse_id: None,
            initial_quantity: None,
        })
        .await
        .expect("first use of the serial");

    // Uniqueness is global, not per product type.
    let err = app
        .services()
        .inventory_items
        .create_item(NewInventoryItem {
            product_type_id: furniture.id,
            serial_number: Some("UNIT-42".to_string()),
            initial_warehouse_id: None,
            initial_quantity: None,
        })
        .await
        .expect_err("serials are globally unique");
    assert_matches!(err, ServiceError::DuplicateSerial(serial) if serial == "UNIT-42");
}

#[tokio::test]
async fn concurrent_creations_never_share_a_serial() {
    let app = TestApp::new().await;
    let pt = app.seed_product_type("Television", "Electronics").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let svc = app.services().inventory_items.clone();
        let product_type_id = pt.id;
        tasks.push(tokio::spawn(async move {
            svc.create_item(NewInventoryItem {
                product_type_id,
                serial_number: None,
                initial_warehouse_id: None,
                initial_quantity: None,
            })
            .await
        }));
    }

    let mut serials = HashSet::new();
    for task in tasks {
        let item = task
            .await
            .expect("task join")
            .expect("each creation should get its own serial");
        assert!(
            serials.insert(item.serial_number.clone()),
            "duplicate serial allocated: {}",
            item.serial_number
        );
    }
    assert_eq!(serials.len(), 8);
}
