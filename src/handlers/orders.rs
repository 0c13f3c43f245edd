use axum::{
    extract::{Path, Query, State},
    response::Response,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::ApiError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::services::orders::CreateOrderInput;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: String,
}

/// Create an order and initialize checkout
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order created, payment link returned", body = crate::services::orders::CreatedOrder),
        (status = 404, description = "A product was not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unreachable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CreateOrderInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let created = state
        .services
        .orders
        .create_order(current_user.id, input)
        .await?;
    Ok(created_response(created))
}

/// List the current user's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    responses(
        (status = 200, description = "Order history")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let orders = state.services.orders.list_user_orders(current_user.id).await?;
    Ok(success_response(orders))
}

/// Get one order
#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = crate::services::orders::OrderWithItems),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state.services.orders.get_order(id, &current_user).await?;
    Ok(success_response(order))
}

/// Cancel an order, refunding through the gateway first
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order canceled"),
        (status = 400, description = "Order is already canceled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state.services.orders.cancel_order(id, &current_user).await?;
    Ok(success_response(order))
}

/// Mark a pending order shipped (admin)
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/ship",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order shipped"),
        (status = 400, description = "Order is not pending", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn ship_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let order = state.services.orders.ship_order(id).await?;
    Ok(success_response(order))
}

/// Gateway redirect/webhook for checkout completion
#[utoipa::path(
    get,
    path = "/api/v1/payments/callback",
    params(("reference" = String, Query, description = "Gateway transaction reference")),
    responses(
        (status = 200, description = "Payment verified", body = crate::services::orders::CallbackOutcome),
        (status = 400, description = "Payment failed", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unreachable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let outcome = state
        .services
        .orders
        .handle_payment_callback(&query.reference)
        .await?;
    Ok(success_response(outcome))
}
