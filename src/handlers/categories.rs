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
use crate::services::catalog::CreateCategoryInput;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/:id", delete(delete_category))
        .with_role(state, Role::Admin)
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(success_response(categories))
}

async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let category = state.services.catalog.create_category(payload).await?;
    Ok(created_response(category))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.catalog.delete_category(id).await?;
    Ok(message_response("Category deleted"))
}
