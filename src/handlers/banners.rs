use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthRouterExt;
use crate::entities::user::Role;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, message_response, success_response, validate_input,
};
use crate::services::content::{CreateBannerInput, UpdateBannerInput};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(active_banners))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_banners))
        .route("/", post(create_banner))
        .route("/:id", patch(update_banner))
        .route("/:id", delete(delete_banner))
        .with_role(state, Role::Admin)
}

async fn active_banners(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let banners = state.services.content.active_banners().await?;
    Ok(success_response(banners))
}

async fn list_banners(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let banners = state.services.content.list_banners().await?;
    Ok(success_response(banners))
}

async fn create_banner(
    State(state): State<AppState>,
    Json(payload): Json<CreateBannerInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let banner = state.services.content.create_banner(payload).await?;
    Ok(created_response(banner))
}

async fn update_banner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBannerInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let banner = state.services.content.update_banner(id, payload).await?;
    Ok(success_response(banner))
}

async fn delete_banner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.content.delete_banner(id).await?;
    Ok(message_response("Banner deleted"))
}
