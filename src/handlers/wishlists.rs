use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use crate::auth::{AuthRouterExt, Principal};
use crate::errors::ApiError;
use crate::handlers::common::{message_response, success_response};
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_wishlist))
        .route("/:product_id", post(add_to_wishlist))
        .route("/:product_id", delete(remove_from_wishlist))
        .with_auth(state)
}

async fn list_wishlist(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.services.wishlist.list(principal.id).await?;
    Ok(success_response(entries))
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.wishlist.add(principal.id, product_id).await?;
    Ok(message_response("Added to wishlist"))
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .wishlist
        .remove(principal.id, product_id)
        .await?;
    Ok(message_response("Removed from wishlist"))
}
