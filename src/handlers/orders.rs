use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthRouterExt, Principal};
use crate::entities::order::{OrderStatus, PaymentStatus};
use crate::entities::user::Role;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, success_response, validate_input, Paginated, PaginationParams,
};
use crate::services::orders::{
    AdminOrderUpdate, CancelOrderInput, CheckoutInput, OrderFilter, VerifyPaymentInput,
};
use crate::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/my-orders", get(my_orders))
        .route("/:id", get(get_order))
        .route("/:id/verify-payment", post(verify_payment))
        .route("/:id/cancel-payment", post(cancel_order))
        .with_auth(state)
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id", get(admin_get_order))
        .route("/:id", patch(admin_update_order))
        .route("/:id/status", patch(admin_set_status))
        .route("/:id/tracking", patch(admin_set_tracking))
        .route("/:id/notes", patch(admin_set_notes))
        .with_role(state, Role::Admin)
}

async fn checkout(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CheckoutInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let view = state.services.orders.checkout(principal.id, payload).await?;
    Ok(created_response(view))
}

async fn my_orders(
    State(state): State<AppState>,
    principal: Principal,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .my_orders(principal.id, pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(orders, total, &pagination)))
}

async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.services.orders.get_order(principal.id, id).await?;
    Ok(success_response(view))
}

async fn verify_payment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyPaymentInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let view = state
        .services
        .orders
        .verify_payment(principal.id, id, payload)
        .await?;
    Ok(success_response(view))
}

async fn cancel_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelOrderInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let view = state
        .services
        .orders
        .cancel_order(principal.id, id, payload)
        .await?;
    Ok(success_response(view))
}

#[derive(Debug, Default, Deserialize)]
struct AdminOrderQuery {
    status: Option<String>,
    payment_status: Option<String>,
    user_id: Option<Uuid>,
    page: Option<u64>,
    per_page: Option<u64>,
}

impl AdminOrderQuery {
    fn pagination(&self) -> PaginationParams {
        let mut pagination = PaginationParams::default();
        if let Some(page) = self.page {
            pagination.page = page;
        }
        if let Some(per_page) = self.per_page {
            pagination.per_page = per_page;
        }
        pagination
    }
}

async fn admin_list_orders(
    State(state): State<AppState>,
    Query(query): Query<AdminOrderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let order_status = query
        .status
        .as_deref()
        .map(OrderStatus::from_str)
        .transpose()
        .map_err(|_| ApiError::BadRequest("Unknown order status".to_string()))?;
    let payment_status = match query.payment_status.as_deref() {
        None => None,
        Some("pending") => Some(PaymentStatus::Pending),
        Some("paid") => Some(PaymentStatus::Paid),
        Some("failed") => Some(PaymentStatus::Failed),
        Some(_) => return Err(ApiError::BadRequest("Unknown payment status".to_string())),
    };

    let pagination = query.pagination();
    let filter = OrderFilter {
        order_status,
        payment_status,
        user_id: query.user_id,
    };
    let (orders, total) = state
        .services
        .orders
        .list_orders(filter, pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(orders, total, &pagination)))
}

async fn admin_get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.services.orders.get_order_admin(id).await?;
    Ok(success_response(view))
}

async fn admin_update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminOrderUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let view = state.services.orders.admin_update_order(id, payload).await?;
    Ok(success_response(view))
}

#[derive(Debug, Deserialize)]
struct StatusInput {
    order_status: OrderStatus,
}

async fn admin_set_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusInput>,
) -> Result<impl IntoResponse, ApiError> {
    let update = AdminOrderUpdate {
        order_status: Some(payload.order_status),
        ..Default::default()
    };
    let view = state.services.orders.admin_update_order(id, update).await?;
    Ok(success_response(view))
}

#[derive(Debug, Deserialize, Validate)]
struct TrackingInput {
    #[validate(length(min = 1, max = 64))]
    tracking_number: String,
    estimated_delivery: Option<chrono::DateTime<chrono::Utc>>,
}

async fn admin_set_tracking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TrackingInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let update = AdminOrderUpdate {
        tracking_number: Some(payload.tracking_number),
        estimated_delivery: payload.estimated_delivery,
        ..Default::default()
    };
    let view = state.services.orders.admin_update_order(id, update).await?;
    Ok(success_response(view))
}

#[derive(Debug, Deserialize, Validate)]
struct NotesInput {
    #[validate(length(max = 500))]
    notes: String,
}

async fn admin_set_notes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NotesInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let update = AdminOrderUpdate {
        notes: Some(payload.notes),
        ..Default::default()
    };
    let view = state.services.orders.admin_update_order(id, update).await?;
    Ok(success_response(view))
}
