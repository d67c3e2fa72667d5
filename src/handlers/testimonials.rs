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
use crate::services::content::CreateTestimonialInput;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(published_testimonials))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_testimonials))
        .route("/", post(create_testimonial))
        .route("/:id", delete(delete_testimonial))
        .with_role(state, Role::Admin)
}

async fn published_testimonials(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let testimonials = state.services.content.published_testimonials().await?;
    Ok(success_response(testimonials))
}

async fn list_testimonials(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let testimonials = state.services.content.list_testimonials().await?;
    Ok(success_response(testimonials))
}

async fn create_testimonial(
    State(state): State<AppState>,
    Json(payload): Json<CreateTestimonialInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let testimonial = state.services.content.create_testimonial(payload).await?;
    Ok(created_response(testimonial))
}

async fn delete_testimonial(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.content.delete_testimonial(id).await?;
    Ok(message_response("Testimonial deleted"))
}
