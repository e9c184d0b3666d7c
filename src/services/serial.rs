//! Serial number allocation.
//!
//! Serials are human-readable: a category-derived prefix plus a zero-padded
//! sequence, e.g. `ELE-001`. Allocation probes candidates against the global
//! serial uniqueness of the item registry; the unique index on
//! `serial_number` backstops races between concurrent allocations, which is
//! why `generate` runs on the caller's transaction connection and item
//! creation retries on a uniqueness conflict.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::warn;

use crate::entities::{inventory_item, product_type};
use crate::errors::ServiceError;

/// Safety valve against pathological collision storms. Hitting it means the
/// data needs operator attention, not a retry.
pub const MAX_ATTEMPTS: u32 = 1000;

/// Derives the serial prefix from a product type category: the first three
/// characters upper-cased, or the whole category when shorter.
pub fn category_prefix(category: &str) -> String {
    category.chars().take(3).collect::<String>().to_uppercase()
}

/// Generates a unique serial number for an item of the given product type.
///
/// The starting sequence number is the count of existing items of the type
/// plus one; candidates are probed upward from there until an unused serial
/// is found or the attempt bound trips.
pub async fn generate<C: ConnectionTrait>(
    conn: &C,
    product_type: &product_type::Model,
) -> Result<String, ServiceError> {
    let prefix = category_prefix(&product_type.category);

    let existing_count = inventory_item::Entity::find()
        .filter(inventory_item::Column::ProductTypeId.eq(product_type.id))
        .count(conn)
        .await?;
    let start = existing_count + 1;

    for attempt in 0..MAX_ATTEMPTS {
        let candidate = format!("{}-{:03}", prefix, start + attempt as u64);

        let taken = inventory_item::Entity::find()
            .filter(inventory_item::Column::SerialNumber.eq(candidate.as_str()))
            .count(conn)
            .await?
            > 0;

        if !taken {
            return Ok(candidate);
        }
    }

    warn!(
        product_type_id = %product_type.id,
        category = %product_type.category,
        attempts = MAX_ATTEMPTS,
        "Serial allocation exhausted; serial space for this prefix needs attention"
    );
    Err(ServiceError::SerialAllocationExhausted {
        attempts: MAX_ATTEMPTS,
    })
}
