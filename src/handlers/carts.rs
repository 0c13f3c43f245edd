use axum::{
    extract::{Path, State},
    response::Response,
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::ApiError;
use crate::handlers::common::{success_response, validate_input};
use crate::services::carts::AddToCartInput;
use crate::AppState;

/// Get the current user's cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Cart with items", body = crate::services::carts::CartWithItems)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let cart = state.services.carts.get_cart(current_user.id).await?;
    Ok(success_response(cart))
}

/// Add a product to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/add",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Updated cart", body = crate::services::carts::CartWithItems),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<AddToCartInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let cart = state.services.carts.add_item(current_user.id, input).await?;
    Ok(success_response(cart))
}

/// Remove a product from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/:product_id",
    params(("product_id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Updated cart", body = crate::services::carts::CartWithItems),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(product_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(current_user.id, product_id)
        .await?;
    Ok(success_response(cart))
}
