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
use crate::services::reviews::CreateReviewInput;
use crate::AppState;

/// List a product's reviews
#[utoipa::path(
    get,
    path = "/api/v1/products/:id/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Reviews"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let reviews = state.services.reviews.list_for_product(id).await?;
    Ok(success_response(reviews))
}

/// Review a product
#[utoipa::path(
    post,
    path = "/api/v1/products/:id/reviews",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CreateReviewInput,
    responses(
        (status = 201, description = "Review created"),
        (status = 400, description = "Already reviewed or invalid rating", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateReviewInput>,
) -> Result<Response, ApiError> {
    validate_input(&input)?;
    let review = state
        .services
        .reviews
        .create_review(id, current_user.id, input)
        .await?;
    Ok(created_response(review))
}

/// Delete a review (author or admin)
#[utoipa::path(
    delete,
    path = "/api/v1/reviews/:id",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 403, description = "Not the author", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    state
        .services
        .reviews
        .delete_review(id, &current_user)
        .await?;
    Ok(no_content_response())
}
