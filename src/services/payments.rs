use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::payment::{self, PaymentStatus};
use crate::errors::ServiceError;

/// Bookkeeping for payment records. Every order carries one record created as
/// `pending` at checkout and finalized by the gateway callback.
///
/// Methods take the caller's connection so they compose into the order
/// workflow's transactions.
#[derive(Clone, Default)]
pub struct PaymentService;

impl PaymentService {
    pub fn new() -> Self {
        Self
    }

    /// Creates the pending payment record for a freshly initialized checkout.
    #[instrument(skip(self, conn))]
    pub async fn create_pending(
        &self,
        conn: &impl ConnectionTrait,
        order_id: Uuid,
        gateway_reference: &str,
        amount: Decimal,
    ) -> Result<payment::Model, ServiceError> {
        let record = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            method: Set("paystack".to_string()),
            transaction_id: Set(Some(gateway_reference.to_string())),
            gateway_reference: Set(gateway_reference.to_string()),
            gateway_status: Set(Some("pending".to_string())),
            status: Set(PaymentStatus::Pending),
            amount: Set(amount),
            currency: Set("NGN".to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        Ok(record.insert(conn).await?)
    }

    /// Marks the payment for `gateway_reference` successful.
    ///
    /// Only pending records transition; a record already finalized is left
    /// untouched, which keeps the callback idempotent.
    #[instrument(skip(self, conn))]
    pub async fn mark_successful(
        &self,
        conn: &impl ConnectionTrait,
        gateway_reference: &str,
        gateway_status: &str,
    ) -> Result<(), ServiceError> {
        payment::Entity::update_many()
            .col_expr(
                payment::Column::Status,
                sea_orm::sea_query::Expr::value(PaymentStatus::Successful),
            )
            .col_expr(
                payment::Column::GatewayStatus,
                sea_orm::sea_query::Expr::value(gateway_status),
            )
            .col_expr(
                payment::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(payment::Column::GatewayReference.eq(gateway_reference))
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Marks the payment for `gateway_reference` failed. Same pending-only
    /// guard as `mark_successful`.
    #[instrument(skip(self, conn))]
    pub async fn mark_failed(
        &self,
        conn: &impl ConnectionTrait,
        gateway_reference: &str,
        gateway_status: &str,
    ) -> Result<(), ServiceError> {
        payment::Entity::update_many()
            .col_expr(
                payment::Column::Status,
                sea_orm::sea_query::Expr::value(PaymentStatus::Failed),
            )
            .col_expr(
                payment::Column::GatewayStatus,
                sea_orm::sea_query::Expr::value(gateway_status),
            )
            .col_expr(
                payment::Column::UpdatedAt,
                sea_orm::sea_query::Expr::value(Utc::now()),
            )
            .filter(payment::Column::GatewayReference.eq(gateway_reference))
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .exec(conn)
            .await?;
        Ok(())
    }

    /// Fetches the payment record for an order, if any.
    pub async fn find_by_order(
        &self,
        conn: &impl ConnectionTrait,
        order_id: Uuid,
    ) -> Result<Option<payment::Model>, ServiceError> {
        Ok(payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .one(conn)
            .await?)
    }
}
