use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::entities::order::{self, OrderStatus};
use crate::entities::{order_item, product, shipping_info};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::payments::PaymentService;
use crate::services::paystack::PaymentGateway;

/// Order workflow service.
///
/// Checkout initializes the gateway transaction before anything is persisted,
/// so a gateway failure leaves no partial order behind; persistence of the
/// order, its items, shipping info, and the pending payment record is a single
/// transaction afterwards.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    payments: PaymentService,
    event_sender: Arc<EventSender>,
    callback_url: Option<String>,
}

/// One requested order line
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Shipping details submitted with the order
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ShippingInput {
    #[validate(length(min = 1, max = 200))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub zip_code: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
}

/// Input for creating an order
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    #[validate(length(min = 1))]
    pub items: Vec<OrderLineInput>,
    /// Receipt email forwarded to the gateway
    #[validate(email)]
    pub email: String,
    #[validate]
    pub shipping_info: ShippingInput,
}

/// Response for a created order
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedOrder {
    pub order_id: Uuid,
    /// Gateway-hosted page the customer completes payment on
    pub payment_link: String,
    pub reference: String,
}

/// Order with its line items
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Outcome of the payment callback
#[derive(Debug, Serialize, ToSchema)]
pub struct CallbackOutcome {
    pub message: String,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        payments: PaymentService,
        event_sender: Arc<EventSender>,
        callback_url: Option<String>,
    ) -> Self {
        Self {
            db,
            gateway,
            payments,
            event_sender,
            callback_url,
        }
    }

    /// Creates an order: snapshots current product prices, initializes the
    /// gateway transaction, then persists everything at once.
    ///
    /// Any missing product fails the whole request before the gateway is
    /// contacted; nothing is written in that case.
    #[instrument(skip(self, input))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<CreatedOrder, ServiceError> {
        let mut lines: Vec<(Uuid, i32, Decimal)> = Vec::with_capacity(input.items.len());
        let mut total = Decimal::ZERO;

        for item in &input.items {
            // Per-line validation; the derive only checks the vec itself
            item.validate()?;

            let product = product::Entity::find_by_id(item.product_id)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            total += product.price * Decimal::from(item.quantity);
            lines.push((product.id, item.quantity, product.price));
        }

        let initialized = self
            .gateway
            .initialize_transaction(&input.email, total, self.callback_url.as_deref())
            .await?;

        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let order_record = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total_amount: Set(total),
            status: Set(OrderStatus::Pending),
            payment_reference: Set(Some(initialized.reference.clone())),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        order_record.insert(&txn).await?;

        for (product_id, quantity, price) in lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                price: Set(price),
            };
            item.insert(&txn).await?;
        }

        let shipping = shipping_info::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            address: Set(input.shipping_info.address),
            city: Set(input.shipping_info.city),
            state: Set(input.shipping_info.state),
            zip_code: Set(input.shipping_info.zip_code),
            country: Set(input.shipping_info.country),
        };
        shipping.insert(&txn).await?;

        self.payments
            .create_pending(&txn, order_id, &initialized.reference, total)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;

        info!(order_id = %order_id, total = %total, "created order");
        Ok(CreatedOrder {
            order_id,
            payment_link: initialized.authorization_url,
            reference: initialized.reference,
        })
    }

    /// Handles the gateway redirect/webhook for a checkout reference.
    ///
    /// A successful verification completes the matching pending order and
    /// marks its payment successful. An unknown or already-completed
    /// reference is an idempotent no-op, so redelivered callbacks never
    /// double-apply. A gateway-reported failure finalizes the payment as
    /// failed and surfaces as a client error.
    #[instrument(skip(self))]
    pub async fn handle_payment_callback(
        &self,
        reference: &str,
    ) -> Result<CallbackOutcome, ServiceError> {
        let verified = self.gateway.verify_transaction(reference).await?;

        if !verified.is_successful() {
            let txn = self.db.begin().await?;
            self.payments
                .mark_failed(&txn, reference, &verified.status)
                .await?;
            txn.commit().await?;

            if let Some(order) = self.find_by_reference(reference).await? {
                self.event_sender
                    .send_or_log(Event::PaymentFailed(order.id))
                    .await;
            }

            warn!(reference, status = %verified.status, "payment verification reported failure");
            return Err(ServiceError::PaymentFailed("Payment failed".to_string()));
        }

        let txn = self.db.begin().await?;

        let order = order::Entity::find()
            .filter(order::Column::PaymentReference.eq(reference))
            .one(&txn)
            .await?;

        let Some(order) = order else {
            // Reference we never issued, or a replay after cleanup
            txn.commit().await?;
            return Ok(CallbackOutcome {
                message: "Payment successful".to_string(),
            });
        };

        let completed = order::Entity::update_many()
            .col_expr(
                order::Column::Status,
                sea_orm::sea_query::Expr::value(OrderStatus::Completed),
            )
            .col_expr(
                order::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&txn)
            .await?;

        self.payments
            .mark_successful(&txn, reference, &verified.status)
            .await?;

        txn.commit().await?;

        if completed.rows_affected > 0 {
            self.event_sender
                .send_or_log(Event::OrderCompleted(order.id))
                .await;
            self.event_sender
                .send_or_log(Event::PaymentSucceeded(order.id))
                .await;
            info!(order_id = %order.id, reference, "order completed");
        }

        Ok(CallbackOutcome {
            message: "Payment successful".to_string(),
        })
    }

    /// Cancels an order, refunding through the gateway first.
    ///
    /// Canceling an already-canceled order is rejected, not absorbed. The
    /// status transition is a conditional update so two racing cancels cannot
    /// both pass the guard.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        requester: &CurrentUser,
    ) -> Result<order::Model, ServiceError> {
        let order = self.load_order_scoped(order_id, requester).await?;

        if order.status == OrderStatus::Canceled {
            return Err(ServiceError::BadRequest(
                "Order is already canceled".to_string(),
            ));
        }

        let reference = order.payment_reference.clone().ok_or_else(|| {
            ServiceError::InvalidOperation("Order has no payment reference".to_string())
        })?;

        // Refund first; if it fails the order keeps its current status.
        self.gateway
            .refund_transaction(&reference, order.total_amount)
            .await?;

        let updated = order::Entity::update_many()
            .col_expr(
                order::Column::Status,
                sea_orm::sea_query::Expr::value(OrderStatus::Canceled),
            )
            .col_expr(
                order::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.ne(OrderStatus::Canceled))
            .exec(self.db.as_ref())
            .await?;

        if updated.rows_affected == 0 {
            // Lost the race to another cancel
            return Err(ServiceError::BadRequest(
                "Order is already canceled".to_string(),
            ));
        }

        self.event_sender
            .send_or_log(Event::OrderCanceled(order_id))
            .await;
        self.event_sender
            .send_or_log(Event::PaymentRefunded(order_id))
            .await;

        info!(order_id = %order_id, "canceled order");
        self.load_order_scoped(order_id, requester).await
    }

    /// Marks a pending order shipped (admin operation).
    #[instrument(skip(self))]
    pub async fn ship_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let updated = order::Entity::update_many()
            .col_expr(
                order::Column::Status,
                sea_orm::sea_query::Expr::value(OrderStatus::Shipped),
            )
            .col_expr(
                order::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(self.db.as_ref())
            .await?;

        if updated.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Only pending orders can be shipped (current status: {:?})",
                order.status
            )));
        }

        self.event_sender
            .send_or_log(Event::OrderShipped(order_id))
            .await;

        order::Entity::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Fetches one order with items, scoped to the requester.
    pub async fn get_order(
        &self,
        order_id: Uuid,
        requester: &CurrentUser,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = self.load_order_scoped(order_id, requester).await?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(self.db.as_ref())
            .await?;

        Ok(OrderWithItems { order, items })
    }

    /// Lists the requester's orders, newest first.
    pub async fn list_user_orders(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;

        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let items = order_item::Entity::find()
                .filter(order_item::Column::OrderId.eq(order.id))
                .all(self.db.as_ref())
                .await?;
            result.push(OrderWithItems { order, items });
        }

        Ok(result)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::PaymentReference.eq(reference))
            .one(self.db.as_ref())
            .await?)
    }

    /// Loads an order; non-admin requesters only see their own, and a
    /// foreign order reads as absent rather than forbidden.
    async fn load_order_scoped(
        &self,
        order_id: Uuid,
        requester: &CurrentUser,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !requester.is_admin() && order.user_id != requester.id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_order_input_requires_items_and_email() {
        let empty = CreateOrderInput {
            items: vec![],
            email: "buyer@example.com".into(),
            shipping_info: sample_shipping(),
        };
        assert!(empty.validate().is_err());

        let bad_email = CreateOrderInput {
            items: vec![OrderLineInput {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
            email: "not-an-email".into(),
            shipping_info: sample_shipping(),
        };
        assert!(bad_email.validate().is_err());

        let valid = CreateOrderInput {
            items: vec![OrderLineInput {
                product_id: Uuid::new_v4(),
                quantity: 2,
            }],
            email: "buyer@example.com".into(),
            shipping_info: sample_shipping(),
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn order_line_quantity_must_be_positive() {
        let line = OrderLineInput {
            product_id: Uuid::new_v4(),
            quantity: 0,
        };
        assert!(line.validate().is_err());
    }

    fn sample_shipping() -> ShippingInput {
        ShippingInput {
            address: "12 Marina Road".into(),
            city: "Lagos".into(),
            state: "Lagos".into(),
            zip_code: "100001".into(),
            country: "Nigeria".into(),
        }
    }
}
