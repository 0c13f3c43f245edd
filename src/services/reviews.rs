use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::entities::{product, review};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Review service. Each user gets one review per product.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for creating a review
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub review_text: Option<String>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a review for a product. The product must exist and the user
    /// must not have reviewed it before.
    #[instrument(skip(self, input))]
    pub async fn create_review(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        input: CreateReviewInput,
    ) -> Result<review::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::BadRequest(
                "You have already reviewed this product".to_string(),
            ));
        }

        let record = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(input.rating),
            review_text: Set(input.review_text),
            created_at: Set(Utc::now()),
        };

        let record = record.insert(self.db.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::ReviewCreated(record.id))
            .await;

        info!(review_id = %record.id, product_id = %product_id, "created review");
        Ok(record)
    }

    /// Lists a product's reviews, newest first.
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<review::Model>, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        Ok(review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    /// Hard-deletes a review. Only its author or an admin may delete it.
    #[instrument(skip(self))]
    pub async fn delete_review(
        &self,
        review_id: Uuid,
        requester: &CurrentUser,
    ) -> Result<(), ServiceError> {
        let record = review::Entity::find_by_id(review_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;

        if !requester.is_admin() && record.user_id != requester.id {
            return Err(ServiceError::Forbidden(
                "You may only delete your own reviews".to_string(),
            ));
        }

        record.delete(self.db.as_ref()).await?;

        self.event_sender
            .send_or_log(Event::ReviewDeleted(review_id))
            .await;

        Ok(())
    }
}
