use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{cart, cart_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Shopping cart service. One cart per user, created lazily on first add.
///
/// Every mutation runs inside a transaction and finishes by recomputing the
/// cart total from its line items, so the stored total can never drift from
/// the lines regardless of which path touched them.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Input for adding a product to the cart
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Cart with its line items
#[derive(Debug, Serialize, ToSchema)]
pub struct CartWithItems {
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the user's cart with items. Users who never added anything get
    /// an empty cart shape rather than a 404.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let existing = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?;

        match existing {
            Some(cart) => {
                let items = cart_item::Entity::find()
                    .filter(cart_item::Column::CartId.eq(cart.id))
                    .all(self.db.as_ref())
                    .await?;
                Ok(CartWithItems { cart, items })
            }
            None => Ok(CartWithItems {
                cart: cart::Model {
                    id: Uuid::nil(),
                    user_id,
                    total: Decimal::ZERO,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
                items: Vec::new(),
            }),
        }
    }

    /// Adds a product to the user's cart, incrementing the quantity when the
    /// product is already a line item.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let cart = match cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
        {
            Some(cart) => cart,
            None => {
                let new_cart = cart::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    total: Set(Decimal::ZERO),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                new_cart.insert(&txn).await?
            }
        };

        let existing_item = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing_item {
            let current_quantity = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current_quantity + input.quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                unit_price: Set(product.price),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        let cart_id = cart.id;
        let updated = self.recalculate_cart_total(&txn, cart_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id,
                product_id: input.product_id,
            })
            .await;

        info!(
            cart_id = %cart_id,
            product_id = %input.product_id,
            quantity = input.quantity,
            "added item to cart"
        );
        Ok(updated)
    }

    /// Removes a product from the user's cart. Removing a product that is not
    /// in the cart is a no-op success.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart not found".to_string()))?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        let cart_id = cart.id;
        let updated = self.recalculate_cart_total(&txn, cart_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id,
                product_id,
            })
            .await;

        Ok(updated)
    }

    /// Recomputes the cart total as the sum of line price x quantity. Runs on
    /// every mutation path, inside the caller's transaction.
    async fn recalculate_cart_total(
        &self,
        conn: &impl sea_orm::ConnectionTrait,
        cart_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let total: Decimal = items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum();

        let mut cart: cart::ActiveModel = cart::Entity::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?
            .into();

        cart.total = Set(total);
        cart.updated_at = Set(Utc::now());
        let cart = cart.update(conn).await?;

        Ok(CartWithItems { cart, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn add_to_cart_input_rejects_non_positive_quantity() {
        let zero = AddToCartInput {
            product_id: Uuid::new_v4(),
            quantity: 0,
        };
        assert!(zero.validate().is_err());

        let negative = AddToCartInput {
            product_id: Uuid::new_v4(),
            quantity: -2,
        };
        assert!(negative.validate().is_err());

        let valid = AddToCartInput {
            product_id: Uuid::new_v4(),
            quantity: 3,
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn line_total_math() {
        // Mirrors the recomputation: sum of unit_price * quantity
        let lines = [(dec!(10.50), 2), (dec!(3.25), 3)];
        let total: Decimal = lines
            .iter()
            .map(|(price, qty)| *price * Decimal::from(*qty))
            .sum();
        assert_eq!(total, dec!(30.75));
    }

    #[test]
    fn add_to_cart_input_deserialization() {
        let json = r#"{
            "product_id": "550e8400-e29b-41d4-a716-446655440000",
            "quantity": 2
        }"#;
        let input: AddToCartInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.quantity, 2);
    }
}
