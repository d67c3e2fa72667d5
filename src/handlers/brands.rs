use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthRouterExt;
use crate::entities::user::Role;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, message_response, success_response, validate_input,
};
use crate::services::catalog::CreateBrandInput;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_brands))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_brand))
        .route("/:id", delete(delete_brand))
        .with_role(state, Role::Admin)
}

async fn list_brands(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let brands = state.services.catalog.list_brands().await?;
    Ok(success_response(brands))
}

async fn create_brand(
    State(state): State<AppState>,
    Json(payload): Json<CreateBrandInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let brand = state.services.catalog.create_brand(payload).await?;
    Ok(created_response(brand))
}

async fn delete_brand(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.catalog.delete_brand(id).await?;
    Ok(message_response("Brand deleted"))
}
