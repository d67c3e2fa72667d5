use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::{AuthRouterExt, Principal};
use crate::errors::ApiError;
use crate::handlers::common::{success_response, validate_input};
use crate::services::carts::{AddItemInput, UpdateItemInput};
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:item_id", put(update_item))
        .route("/items/:item_id", delete(remove_item))
        .with_auth(state)
}

async fn get_cart(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state.services.carts.get_cart(principal.id).await?;
    Ok(success_response(cart))
}

async fn add_item(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<AddItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let cart = state.services.carts.add_item(principal.id, payload).await?;
    Ok(success_response(cart))
}

async fn update_item(
    State(state): State<AppState>,
    principal: Principal,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateItemInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let cart = state
        .services
        .carts
        .update_item(principal.id, item_id, payload)
        .await?;
    Ok(success_response(cart))
}

async fn remove_item(
    State(state): State<AppState>,
    principal: Principal,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(principal.id, item_id)
        .await?;
    Ok(success_response(cart))
}

async fn clear_cart(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state.services.carts.clear(principal.id).await?;
    Ok(success_response(cart))
}
