use axum::{extract::State, response::Response, Extension, Json};

use crate::auth::CurrentUser;
use crate::errors::ApiError;
use crate::handlers::common::{success_response, validate_input};
use crate::services::accounts::UpdateProfileInput;
use crate::AppState;

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Profile", body = crate::auth::CurrentUser)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_profile(
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    Ok(success_response(current_user))
}

/// Update the current user's profile
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    request_body = UpdateProfileInput,
    responses(
        (status = 200, description = "Updated profile", body = crate::services::accounts::AccountSummary),
        (status = 400, description = "Username taken or invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<UpdateProfileInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let updated = state
        .services
        .accounts
        .update_profile(current_user.id, input)
        .await?;
    Ok(success_response(updated))
}

/// List all customer accounts (admin)
#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All customer accounts"),
        (status = 403, description = "Access denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Response, ApiError> {
    let users = state.services.accounts.list_users().await?;
    Ok(success_response(users))
}
