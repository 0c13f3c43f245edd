use axum::{extract::State, response::Response, Json};

use crate::errors::ApiError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::services::accounts::{LoginInput, RegisterInput};
use crate::AppState;

/// Register a customer account
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = crate::services::accounts::AccountSummary),
        (status = 400, description = "Username taken or invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let account = state.services.accounts.register_user(input).await?;
    Ok(created_response(account))
}

/// Log a customer in
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Token issued", body = crate::services::accounts::LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login_user(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let response = state.services.accounts.login_user(input).await?;
    Ok(success_response(response))
}

/// Register an administrator account
#[utoipa::path(
    post,
    path = "/api/v1/auth/admin/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = crate::services::accounts::AccountSummary),
        (status = 400, description = "Username taken or invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn register_admin(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let account = state.services.accounts.register_admin(input).await?;
    Ok(created_response(account))
}

/// Log an administrator in
#[utoipa::path(
    post,
    path = "/api/v1/auth/admin/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Token issued", body = crate::services::accounts::LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login_admin(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let response = state.services.accounts.login_admin(input).await?;
    Ok(success_response(response))
}
