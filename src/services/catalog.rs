use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::entities::{category, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Catalog service for product and category management.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for creating or replacing a product
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(custom = "validate_non_negative_price")]
    pub price: Decimal,
    #[serde(default = "default_in_stock")]
    pub is_in_stock: bool,
    #[validate(url)]
    pub image_url: Option<String>,
    pub category_id: Uuid,
}

fn default_in_stock() -> bool {
    true
}

fn validate_non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Input for creating a category
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Lists the whole catalog.
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find().all(self.db.as_ref()).await?)
    }

    /// Fetches one product.
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Creates a product after confirming its category exists.
    #[instrument(skip(self, input))]
    pub async fn create_product(
        &self,
        input: ProductInput,
        created_by: Uuid,
    ) -> Result<product::Model, ServiceError> {
        self.ensure_category_exists(input.category_id).await?;

        let record = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            description: Set(input.description),
            price: Set(input.price),
            is_in_stock: Set(input.is_in_stock),
            image_url: Set(input.image_url),
            category_id: Set(input.category_id),
            created_by: Set(created_by),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let record = record.insert(self.db.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(record.id))
            .await;

        info!(product_id = %record.id, "created product");
        Ok(record)
    }

    /// Replaces a product's mutable fields, re-checking the category.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: ProductInput,
    ) -> Result<product::Model, ServiceError> {
        let record = product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        self.ensure_category_exists(input.category_id).await?;

        let mut active: product::ActiveModel = record.into();
        active.description = Set(input.description);
        active.price = Set(input.price);
        active.is_in_stock = Set(input.is_in_stock);
        active.image_url = Set(input.image_url);
        active.category_id = Set(input.category_id);
        active.updated_at = Set(Utc::now());

        let record = active.update(self.db.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(record.id))
            .await;

        Ok(record)
    }

    /// Hard-deletes a product. A subsequent get returns 404.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let record = product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        record.delete(self.db.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        info!(product_id = %product_id, "deleted product");
        Ok(())
    }

    /// Lists all categories.
    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find().all(self.db.as_ref()).await?)
    }

    /// Creates a category.
    #[instrument(skip(self, input))]
    pub async fn create_category(
        &self,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let record = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            created_at: Set(Utc::now()),
        };

        Ok(record.insert(self.db.as_ref()).await?)
    }

    /// An unknown category is a client error, not a missing resource: the
    /// request targets a product, the category is just a field of it.
    async fn ensure_category_exists(&self, category_id: Uuid) -> Result<(), ServiceError> {
        category::Entity::find_by_id(category_id)
            .one(self.db.as_ref())
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::BadRequest("Category not found".to_string()))
    }
}
