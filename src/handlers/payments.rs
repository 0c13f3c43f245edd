use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ApiError;
use crate::handlers::common::{success_response, validate_input};
use crate::AppState;

/// Input for the raw transaction-initialize pass-through
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitializeTransactionInput {
    #[validate(email)]
    pub email: String,
    /// Amount in the major unit; converted to the minor unit at the gateway boundary
    pub amount: Decimal,
}

/// Input for charging a reusable authorization
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChargeAuthorizationInput {
    #[validate(email)]
    pub email: String,
    pub amount: Decimal,
    #[validate(length(min = 1))]
    pub authorization_code: String,
}

/// Initialize a raw gateway transaction (admin)
#[utoipa::path(
    post,
    path = "/api/v1/payments/initialize-transaction",
    request_body = InitializeTransactionInput,
    responses(
        (status = 200, description = "Gateway transaction data"),
        (status = 400, description = "Gateway declined", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway unreachable", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initialize_transaction(
    State(state): State<AppState>,
    Json(input): Json<InitializeTransactionInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let data = state
        .services
        .paystack
        .initialize_transaction_raw(&input.email, input.amount)
        .await?;
    Ok(success_response(data))
}

/// Verify a transaction by reference (admin)
pub async fn verify_transaction(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Response, ApiError> {
    let data = state
        .services
        .paystack
        .verify_transaction_raw(&reference)
        .await?;
    Ok(success_response(data))
}

/// List gateway transactions (admin)
pub async fn list_transactions(State(state): State<AppState>) -> Result<Response, ApiError> {
    let data = state.services.paystack.list_transactions().await?;
    Ok(success_response(data))
}

/// Fetch one gateway transaction (admin)
pub async fn fetch_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.services.paystack.fetch_transaction(&id).await?;
    Ok(success_response(data))
}

/// Charge a reusable authorization (admin)
pub async fn charge_authorization(
    State(state): State<AppState>,
    Json(input): Json<ChargeAuthorizationInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let data = state
        .services
        .paystack
        .charge_authorization(&input.email, input.amount, &input.authorization_code)
        .await?;
    Ok(success_response(data))
}

/// Fetch a transaction's timeline (admin)
pub async fn transaction_timeline(
    State(state): State<AppState>,
    Path(id_or_reference): Path<String>,
) -> Result<Response, ApiError> {
    let data = state
        .services
        .paystack
        .transaction_timeline(&id_or_reference)
        .await?;
    Ok(success_response(data))
}

/// Fetch transaction totals (admin)
pub async fn transaction_totals(State(state): State<AppState>) -> Result<Response, ApiError> {
    let data = state.services.paystack.transaction_totals().await?;
    Ok(success_response(data))
}

/// Export transactions (admin)
pub async fn export_transactions(State(state): State<AppState>) -> Result<Response, ApiError> {
    let data = state.services.paystack.export_transactions().await?;
    Ok(success_response(data))
}
