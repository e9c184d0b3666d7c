mod common;

use assert_matches::assert_matches;
use common::TestApp;
use stockledger_api::entities::warehouse;
use stockledger_api::errors::ServiceError;
use stockledger_api::services::{NewProductType, NewWarehouse, UpdateProductType, UpdateWarehouse};
use uuid::Uuid;

#[tokio::test]
async fn warehouse_lifecycle() {
    let app = TestApp::new().await;

    let created = app
        .services()
        .warehouses
        .create_warehouse(NewWarehouse {
            name: "North".to_string(),
            location: "Oslo".to_string(),
            max_capacity: 500,
            status: None,
        })
        .await
        .expect("create");
    assert_eq!(created.current_capacity, 0);
    assert_eq!(created.status, warehouse::STATUS_ACTIVE);
    assert_eq!(created.available_capacity(), 500);

    let fetched = app
        .services()
        .warehouses
        .get_warehouse(created.id)
        .await
        .expect("get");
    assert_eq!(fetched.name, "North");

    let updated = app
        .services()
        .warehouses
        .update_warehouse(
            created.id,
            UpdateWarehouse {
                location: Some("Bergen".to_string()),
                status: Some(warehouse::STATUS_INACTIVE.to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.location, "Bergen");
    assert_eq!(updated.status, warehouse::STATUS_INACTIVE);

    let inactive = app
        .services()
        .warehouses
        .list_warehouses_by_status(warehouse::STATUS_INACTIVE)
        .await
        .expect("list by status");
    assert_eq!(inactive.len(), 1);

    app.services()
        .warehouses
        .delete_warehouse(created.id)
        .await
        .expect("delete empty warehouse");

    let err = app
        .services()
        .warehouses
        .get_warehouse(created.id)
        .await
        .expect_err("deleted");
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn warehouse_validation_and_missing_ids() {
    let app = TestApp::new().await;

    let err = app
        .services()
        .warehouses
        .create_warehouse(NewWarehouse {
            name: "".to_string(),
            location: "Nowhere".to_string(),
            max_capacity: 10,
            status: None,
        })
        .await
        .expect_err("empty name");
    assert_matches!(err, ServiceError::InvalidInput(_));

    let err = app
        .services()
        .warehouses
        .create_warehouse(NewWarehouse {
            name: "Negative".to_string(),
            location: "Nowhere".to_string(),
            max_capacity: -5,
            status: None,
        })
        .await
        .expect_err("negative capacity");
    assert_matches!(err, ServiceError::InvalidInput(_));

    let err = app
        .services()
        .warehouses
        .update_warehouse(Uuid::new_v4(), UpdateWarehouse::default())
        .await
        .expect_err("unknown id");
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn max_capacity_cannot_shrink_below_current_usage() {
    let app = TestApp::new().await;
    let wh = app.seed_warehouse("Busy", 100).await;
    let pt = app.seed_product_type("Widget", "Electronics").await;
    let item = app.seed_item(pt.id).await;

    app.services()
        .placements
        .place(item.id, wh.id, 70)
        .await
        .expect("place");

    let err = app
        .services()
        .warehouses
        .update_warehouse(
            wh.id,
            UpdateWarehouse {
                max_capacity: Some(50),
                ..Default::default()
            },
        )
        .await
        .expect_err("50 is below the 70 units already held");
    // The proposed maximum is the space on offer; the held stock is what
    // needs to fit.
    assert_matches!(
        err,
        ServiceError::CapacityExceeded {
            available: 50,
            requested: 70,
            ..
        }
    );

    // Shrinking to exactly the current usage is allowed.
    let updated = app
        .services()
        .warehouses
        .update_warehouse(
            wh.id,
            UpdateWarehouse {
                max_capacity: Some(70),
                ..Default::default()
            },
        )
        .await
        .expect("shrink to exact usage");
    assert_eq!(updated.max_capacity, 70);
    assert_eq!(updated.available_capacity(), 0);
}

#[tokio::test]
async fn warehouse_with_stock_cannot_be_deleted() {
    let app = TestApp::new().await;
    let wh = app.seed_warehouse("Busy", 100).await;
    let pt = app.seed_product_type("Widget", "Electronics").await;
    let item = app.seed_item(pt.id).await;

    app.services()
        .placements
        .place(item.id, wh.id, 10)
        .await
        .expect("place");

    let err = app
        .services()
        .warehouses
        .delete_warehouse(wh.id)
        .await
        .expect_err("still holds stock");
    assert_matches!(err, ServiceError::Conflict(_));

    app.services()
        .placements
        .remove(wh.id, item.id)
        .await
        .expect("empty the warehouse");
    app.services()
        .warehouses
        .delete_warehouse(wh.id)
        .await
        .expect("delete once empty");
}

#[tokio::test]
async fn product_type_names_are_unique() {
    let app = TestApp::new().await;

    app.seed_product_type("Television", "Electronics").await;
    let other = app.seed_product_type("Desk", "Furniture").await;

    let err = app
        .services()
        .product_types
        .create_product_type(NewProductType {
            name: "Television".to_string(),
            category: "Electronics".to_string(),
            unit_of_measure: "unit".to_string(),
        })
        .await
        .expect_err("duplicate name");
    assert_matches!(err, ServiceError::Conflict(_));

    let err = app
        .services()
        .product_types
        .update_product_type(
            other.id,
            UpdateProductType {
                name: Some("Television".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect_err("rename onto a taken name");
    assert_matches!(err, ServiceError::Conflict(_));

    // Renaming to its own current name is not a conflict.
    let updated = app
        .services()
        .product_types
        .update_product_type(
            other.id,
            UpdateProductType {
                name: Some("Desk".to_string()),
                category: Some("Office".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("self-rename with category change");
    assert_eq!(updated.category, "Office");
}

#[tokio::test]
async fn product_type_listing_by_category() {
    let app = TestApp::new().await;
    app.seed_product_type("Television", "Electronics").await;
    app.seed_product_type("Radio", "Electronics").await;
    app.seed_product_type("Desk", "Furniture").await;

    let electronics = app
        .services()
        .product_types
        .list_by_category("Electronics")
        .await
        .expect("list by category");
    assert_eq!(electronics.len(), 2);

    let all = app
        .services()
        .product_types
        .list_product_types()
        .await
        .expect("list all");
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn referenced_product_type_cannot_be_deleted() {
    let app = TestApp::new().await;
    let pt = app.seed_product_type("Television", "Electronics").await;
    let item = app.seed_item(pt.id).await;

    let err = app
        .services()
        .product_types
        .delete_product_type(pt.id)
        .await
        .expect_err("an item references it");
    assert_matches!(err, ServiceError::Conflict(_));

    app.services()
        .inventory_items
        .delete_item(item.id)
        .await
        .expect("delete the referencing item");
    app.services()
        .product_types
        .delete_product_type(pt.id)
        .await
        .expect("delete once unreferenced");
}
