use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
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
use crate::services::users::{
    AddressInput, ChangePasswordInput, CreateAdminInput, UpdateProfileInput,
};
use crate::AppState;

/// Profile and address book, nested at `/users/me`.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", patch(update_profile))
        .route("/me/change-password", post(change_password))
        .route("/me/addresses", get(list_addresses))
        .route("/me/addresses", post(add_address))
        .route("/me/addresses/:address_id", put(update_address))
        .route("/me/addresses/:address_id", delete(delete_address))
        .route("/me/addresses/:address_id/default", post(set_default_address))
        .with_auth(state)
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_users))
        .route("/:id", patch(admin_set_active))
        .with_role(state, Role::Admin)
}

/// Admin account management; super-admin only.
pub fn super_admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_admins))
        .route("/", post(create_admin))
        .with_role(state, Role::SuperAdmin)
}

async fn update_profile(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let user = state
        .services
        .users
        .update_profile(principal.id, payload)
        .await?;
    Ok(success_response(user))
}

async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<ChangePasswordInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    state
        .services
        .users
        .change_password(principal.id, payload)
        .await?;
    Ok(message_response("Password changed"))
}

async fn list_addresses(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.services.users.get_user(principal.id).await?;
    Ok(success_response(user.addresses))
}

async fn add_address(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<AddressInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let user = state
        .services
        .users
        .add_address(principal.id, payload)
        .await?;
    Ok(created_response(user.addresses))
}

async fn update_address(
    State(state): State<AppState>,
    principal: Principal,
    Path(address_id): Path<Uuid>,
    Json(payload): Json<AddressInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let user = state
        .services
        .users
        .update_address(principal.id, address_id, payload)
        .await?;
    Ok(success_response(user.addresses))
}

async fn delete_address(
    State(state): State<AppState>,
    principal: Principal,
    Path(address_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .delete_address(principal.id, address_id)
        .await?;
    Ok(success_response(user.addresses))
}

async fn set_default_address(
    State(state): State<AppState>,
    principal: Principal,
    Path(address_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .set_default_address(principal.id, address_id)
        .await?;
    Ok(success_response(user.addresses))
}

#[derive(Debug, Default, Deserialize)]
struct UserListQuery {
    q: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn admin_list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mut pagination = PaginationParams::default();
    if let Some(page) = query.page {
        pagination.page = page;
    }
    if let Some(per_page) = query.per_page {
        pagination.per_page = per_page;
    }

    let (users, total) = state
        .services
        .users
        .list_users(query.q.as_deref(), pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(users, total, &pagination)))
}

#[derive(Debug, Deserialize, ToSchema)]
struct SetActiveInput {
    is_active: bool,
}

async fn admin_set_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .services
        .users
        .set_user_active(id, payload.is_active)
        .await?;
    Ok(success_response(user))
}

async fn list_admins(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let admins = state.services.users.list_admins().await?;
    Ok(success_response(admins))
}

async fn create_admin(
    State(state): State<AppState>,
    Json(payload): Json<CreateAdminInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let admin = state.services.users.create_admin(payload).await?;
    Ok(created_response(admin))
}
