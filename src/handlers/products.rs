use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthRouterExt;
use crate::entities::product::ProductStatus;
use crate::entities::user::Role;
use crate::errors::ApiError;
use crate::handlers::common::{
    created_response, message_response, success_response, validate_input, Paginated,
    PaginationParams,
};
use crate::services::catalog::{
    CreateProductInput, ProductFilter, UpdateProductInput,
};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:slug", get(get_product))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_products))
        .route("/", post(create_product))
        .route("/:id", get(admin_get_product))
        .route("/:id", patch(update_product))
        .route("/:id", delete(archive_product))
        .with_role(state, Role::Admin)
}

#[derive(Debug, Default, Deserialize)]
struct ProductQuery {
    q: Option<String>,
    category_id: Option<Uuid>,
    brand_id: Option<Uuid>,
    sort: Option<String>,
    status: Option<ProductStatus>,
    page: Option<u64>,
    per_page: Option<u64>,
}

impl ProductQuery {
    fn split(self) -> (ProductFilter, PaginationParams) {
        let mut pagination = PaginationParams::default();
        if let Some(page) = self.page {
            pagination.page = page;
        }
        if let Some(per_page) = self.per_page {
            pagination.per_page = per_page;
        }
        let filter = ProductFilter {
            q: self.q,
            category_id: self.category_id,
            brand_id: self.brand_id,
            sort: self.sort,
            status: self.status,
        };
        (filter, pagination)
    }
}

/// Public catalog: only Active products, sort keys whitelisted.
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, pagination) = query.split();
    let (products, total) = state
        .services
        .catalog
        .list_products(filter, false, pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(products, total, &pagination)))
}

async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.catalog.get_product_by_slug(&slug).await?;
    Ok(success_response(product))
}

async fn admin_list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (filter, pagination) = query.split();
    let (products, total) = state
        .services
        .catalog
        .list_products(filter, true, pagination.page(), pagination.per_page())
        .await?;
    Ok(success_response(Paginated::new(products, total, &pagination)))
}

async fn admin_get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(success_response(product))
}

async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state.services.catalog.create_product(payload).await?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response(product))
}

async fn archive_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.catalog.archive_product(id).await?;
    Ok(message_response("Product archived"))
}
