use axum::{
    extract::{Path, State},
    response::Response,
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, no_content_response, success_response, validate_input,
};
use crate::services::catalog::{CategoryInput, ProductInput};
use crate::AppState;

/// List all products
#[utoipa::path(
    get,
    path = "/api/v1/products",
    responses(
        (status = 200, description = "Product list")
    ),
    tag = "Catalog"
)]
pub async fn list_products(State(state): State<AppState>) -> Result<Response, ApiError> {
    let products = state.services.catalog.list_products().await?;
    Ok(success_response(products))
}

/// Get one product
#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(success_response(product))
}

/// Create a product (admin)
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid input or unknown category", body = crate::errors::ErrorResponse),
        (status = 403, description = "Access denied")
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<ProductInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let product = state
        .services
        .catalog
        .create_product(input, current_user.id)
        .await?;
    Ok(created_response(product))
}

/// Update a product (admin)
#[utoipa::path(
    put,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated"),
        (status = 400, description = "Invalid input or unknown category", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let product = state.services.catalog.update_product(id, input).await?;
    Ok(success_response(product))
}

/// Delete a product (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state.services.catalog.delete_product(id).await?;
    Ok(no_content_response())
}

/// List categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Response, ApiError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(success_response(categories))
}

/// Create a category (admin)
pub async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let category = state.services.catalog.create_category(input).await?;
    Ok(created_response(category))
}
