use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::{clear_session_cookie, session_cookie, AuthRouterExt, Principal};
use crate::errors::ApiError;
use crate::handlers::common::{message_response, success_response, validate_input};
use crate::services::users::{
    ForgotPasswordInput, LoginInput, RegisterInput, ResetPasswordInput,
};
use crate::{ApiResponse, AppState};

/// Customer-facing session routes.
pub fn routes(state: AppState) -> Router<AppState> {
    let authed = Router::new()
        .route("/me", get(me))
        .route("/admin/me", get(me))
        .with_auth(state);

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/admin/login", post(admin_login))
        .route("/logout", post(logout))
        .route("/admin/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .merge(authed)
}

#[derive(Debug, Serialize)]
struct SessionBody<T: Serialize> {
    account: T,
    token: String,
}

fn session_response<T: Serialize>(
    state: &AppState,
    account: T,
    token: String,
) -> impl IntoResponse {
    let cookie = session_cookie(
        &token,
        state.auth.token_ttl_secs(),
        !state.config.is_development(),
    );
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(SessionBody { account, token })),
    )
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let user = state.services.users.register(payload).await?;
    let token = state
        .auth
        .generate_token(user.id, &user.email, user.role)?;

    let cookie = session_cookie(
        &token,
        state.auth.token_ttl_secs(),
        !state.config.is_development(),
    );
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(SessionBody {
            account: user,
            token,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let user = state.services.users.authenticate(payload).await?;
    let token = state
        .auth
        .generate_token(user.id, &user.email, user.role)?;
    Ok(session_response(&state, user, token))
}

async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let admin = state.services.users.authenticate_admin(payload).await?;
    let token = state
        .auth
        .generate_token(admin.id, &admin.email, admin.role)?;
    Ok(session_response(&state, admin, token))
}

async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = clear_session_cookie(!state.config.is_development());
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::<()>::message("Logged out")),
    )
}

/// Current account, shaped like the login payload minus the token.
async fn me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Response, ApiError> {
    if principal.is_admin() {
        if let Ok(admin) = state.services.users.get_admin(principal.id).await {
            return Ok(success_response(admin).into_response());
        }
    }
    let user = state.services.users.get_user(principal.id).await?;
    Ok(success_response(user).into_response())
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    state.services.users.forgot_password(payload).await?;
    // identical response whether or not the account exists
    Ok(message_response(
        "If the email is registered, a reset code has been sent",
    ))
}

async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    state.services.users.reset_password(payload).await?;
    Ok(message_response("Password updated"))
}
