use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthRouterExt, Principal};
use crate::entities::user::Role;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, message_response, success_response, validate_input, Paginated,
    PaginationParams,
};
use crate::services::reviews::SubmitReviewInput;
use crate::AppState;

/// Mounted at `/reviews`; listing is public, submitting needs a session.
pub fn routes(state: AppState) -> Router<AppState> {
    let authed = Router::new()
        .route("/product/:product_id", post(submit_review))
        .with_auth(state);

    Router::new()
        .route("/product/:product_id", get(list_reviews))
        .merge(authed)
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_reviews))
        .route("/:id", patch(set_approval))
        .route("/:id", delete(delete_review))
        .with_role(state, Role::Admin)
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (reviews, total) = state
        .services
        .reviews
        .list_for_product(product_id, pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(reviews, total, &pagination)))
}

async fn submit_review(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<SubmitReviewInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let review = state
        .services
        .reviews
        .submit(principal.id, product_id, payload)
        .await?;
    Ok(created_response(review))
}

async fn admin_list_reviews(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (reviews, total) = state
        .services
        .reviews
        .list_all(pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(reviews, total, &pagination)))
}

#[derive(Debug, Deserialize, ToSchema)]
struct ApprovalInput {
    is_approved: bool,
}

async fn set_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApprovalInput>,
) -> Result<impl IntoResponse, ApiError> {
    let review = state
        .services
        .reviews
        .set_approval(id, payload.is_approved)
        .await?;
    Ok(success_response(review))
}

async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.reviews.delete(id).await?;
    Ok(message_response("Review deleted"))
}
