use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthRouterExt, Principal};
use crate::entities::coupon;
use crate::entities::user::Role;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, message_response, success_response, validate_input, Paginated,
    PaginationParams,
};
use crate::services::coupons::{self, CreateCouponInput, UpdateCouponInput};
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/validate", post(validate_coupon))
        .with_auth(state)
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons))
        .route("/", post(create_coupon))
        .route("/:id", get(get_coupon))
        .route("/:id", patch(update_coupon))
        .route("/:id", delete(delete_coupon))
        .with_role(state, Role::Admin)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
struct ValidateCouponInput {
    #[validate(length(min = 1, max = 32))]
    code: String,
}

#[derive(Debug, Serialize)]
struct CouponPreview {
    coupon: coupon::Model,
    discount: Decimal,
    subtotal: Decimal,
}

/// Checks a code against the caller's current cart and previews the
/// discount it would apply at checkout.
async fn validate_coupon(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<ValidateCouponInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state.services.carts.get_cart(principal.id).await?;
    let coupon = state
        .services
        .coupons
        .validate_code(&payload.code, cart.total)
        .await?;

    let shipping_fee = if cart.total >= state.free_shipping_threshold() {
        Decimal::ZERO
    } else {
        state.shipping_fee()
    };
    let discount = coupons::discount_for(&coupon, cart.total, shipping_fee);

    Ok(success_response(CouponPreview {
        coupon,
        discount,
        subtotal: cart.total,
    }))
}

async fn list_coupons(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (coupons, total) = state
        .services
        .coupons
        .list_coupons(pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(coupons, total, &pagination)))
}

async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CreateCouponInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let coupon = state.services.coupons.create_coupon(payload).await?;
    Ok(created_response(coupon))
}

async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state.services.coupons.get_coupon(id).await?;
    Ok(success_response(coupon))
}

async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let coupon = state.services.coupons.update_coupon(id, payload).await?;
    Ok(success_response(coupon))
}

async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.coupons.delete_coupon(id).await?;
    Ok(message_response("Coupon deleted"))
}
