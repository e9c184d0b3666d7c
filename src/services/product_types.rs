//! Product catalog: identity metadata for product types.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::db::{self, DbPool};
use crate::entities::{inventory_item, product_type};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProductType {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,

    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: String,

    #[validate(length(min = 1, message = "Unit of measure cannot be empty"))]
    pub unit_of_measure: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductType {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: Option<String>,

    #[validate(length(min = 1, message = "Unit of measure cannot be empty"))]
    pub unit_of_measure: Option<String>,
}

/// Service for managing product types
#[derive(Clone)]
pub struct ProductTypeService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductTypeService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn send_event(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }

    #[instrument(skip(self))]
    pub async fn create_product_type(
        &self,
        input: NewProductType,
    ) -> Result<product_type::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        let db = self.db_pool.as_ref();

        let name_taken = product_type::Entity::find()
            .filter(product_type::Column::Name.eq(input.name.as_str()))
            .count(db)
            .await?
            > 0;
        if name_taken {
            return Err(ServiceError::Conflict(format!(
                "Product type '{}' already exists",
                input.name
            )));
        }

        let now = Utc::now().fixed_offset();
        let model = product_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            category: Set(input.category),
            unit_of_measure: Set(input.unit_of_measure),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(product_type_id = %model.id, name = %model.name, "Created product type");
        self.send_event(Event::ProductTypeCreated(model.id)).await?;

        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_product_type(&self, id: Uuid) -> Result<product_type::Model, ServiceError> {
        product_type::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::not_found("Product type", id))
    }

    #[instrument(skip(self))]
    pub async fn list_product_types(&self) -> Result<Vec<product_type::Model>, ServiceError> {
        product_type::Entity::find()
            .order_by_asc(product_type::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<product_type::Model>, ServiceError> {
        product_type::Entity::find()
            .filter(product_type::Column::Category.eq(category))
            .order_by_asc(product_type::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Edits name/category/unit. These do not cascade to existing items or
    /// their serial numbers.
    #[instrument(skip(self))]
    pub async fn update_product_type(
        &self,
        id: Uuid,
        input: UpdateProductType,
    ) -> Result<product_type::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        let updated = db::transaction_with_retry(&self.db_pool, move |txn| {
            let input = input.clone();
            Box::pin(async move {
                let existing = product_type::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Product type", id))?;

                if let Some(new_name) = &input.name {
                    if *new_name != existing.name {
                        let name_taken = product_type::Entity::find()
                            .filter(product_type::Column::Name.eq(new_name.as_str()))
                            .count(txn)
                            .await?
                            > 0;
                        if name_taken {
                            return Err(ServiceError::Conflict(format!(
                                "Product type '{}' already exists",
                                new_name
                            )));
                        }
                    }
                }

                let mut active = existing.into_active_model();
                if let Some(name) = input.name {
                    active.name = Set(name);
                }
                if let Some(category) = input.category {
                    active.category = Set(category);
                }
                if let Some(unit) = input.unit_of_measure {
                    active.unit_of_measure = Set(unit);
                }
                active.updated_at = Set(Utc::now().fixed_offset());

                active.update(txn).await.map_err(ServiceError::DatabaseError)
            })
        })
        .await?;

        info!(product_type_id = %id, "Updated product type");
        self.send_event(Event::ProductTypeUpdated(id)).await?;

        Ok(updated)
    }

    /// Deletes a product type. Refused while inventory items reference it.
    #[instrument(skip(self))]
    pub async fn delete_product_type(&self, id: Uuid) -> Result<(), ServiceError> {
        db::transaction_with_retry(&self.db_pool, move |txn| {
            Box::pin(async move {
                let existing = product_type::Entity::find_by_id(id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Product type", id))?;

                let referencing_items = inventory_item::Entity::find()
                    .filter(inventory_item::Column::ProductTypeId.eq(id))
                    .count(txn)
                    .await?;
                if referencing_items > 0 {
                    return Err(ServiceError::Conflict(format!(
                        "Product type '{}' is referenced by {} item(s)",
                        existing.name, referencing_items
                    )));
                }

                product_type::Entity::delete_by_id(id).exec(txn).await?;
                Ok(())
            })
        })
        .await?;

        info!(product_type_id = %id, "Deleted product type");
        self.send_event(Event::ProductTypeDeleted(id)).await?;

        Ok(())
    }
}
