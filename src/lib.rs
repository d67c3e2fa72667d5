pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::carts::CartService;
use crate::services::catalog::CatalogService;
use crate::services::content::ContentService;
use crate::services::coupons::CouponService;
use crate::services::inventory::InventoryService;
use crate::services::notifications::EmailNotifier;
use crate::services::orders::OrderService;
use crate::services::payments::PaymentGatewayClient;
use crate::services::reviews::ReviewService;
use crate::services::users::UserService;
use crate::services::wishlist::WishlistService;

/// Response envelope shared by every endpoint. Errors use the same shape with
/// `success` pinned to `false` (see `errors::ErrorResponse`).
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn message(message: &str) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.to_string()),
        }
    }
}

/// Service registry built once at startup.
pub struct AppServices {
    pub carts: CartService,
    pub catalog: CatalogService,
    pub content: ContentService,
    pub coupons: CouponService,
    pub inventory: InventoryService,
    pub orders: OrderService,
    pub reviews: ReviewService,
    pub users: UserService,
    pub wishlist: WishlistService,
}

impl AppServices {
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        auth: AuthService,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let notifier = EmailNotifier::new(
            config.email_relay_url.clone().unwrap_or_default(),
            config.email_from.clone(),
            config.email_timeout_secs,
        );
        let gateway = PaymentGatewayClient::new(
            config.gateway_base_url.clone(),
            config.gateway_key_id.clone(),
            config.gateway_key_secret.clone(),
        );

        let carts = CartService::new(db.clone(), event_sender.clone());
        let coupons = CouponService::new(db.clone(), event_sender.clone());
        let inventory = InventoryService::new(db.clone(), event_sender.clone());
        let orders = OrderService::new(
            db.clone(),
            event_sender.clone(),
            carts.clone(),
            coupons.clone(),
            inventory.clone(),
            gateway,
            notifier.clone(),
            Decimal::from(config.free_shipping_threshold),
            Decimal::from(config.shipping_fee),
        );

        Self {
            carts,
            catalog: CatalogService::new(db.clone(), event_sender.clone()),
            content: ContentService::new(db.clone()),
            coupons,
            inventory,
            orders,
            reviews: ReviewService::new(db.clone(), event_sender.clone()),
            users: UserService::new(db.clone(), auth, notifier, event_sender),
            wishlist: WishlistService::new(db),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub services: Arc<AppServices>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let auth = AuthService::new(
            db.clone(),
            config.jwt_secret.clone(),
            config.jwt_expiration_secs,
        );
        let services = Arc::new(AppServices::build(
            db,
            &config,
            auth.clone(),
            event_sender,
        ));
        Self {
            config,
            auth,
            services,
        }
    }

    pub fn free_shipping_threshold(&self) -> Decimal {
        Decimal::from(self.config.free_shipping_threshold)
    }

    pub fn shipping_fee(&self) -> Decimal {
        Decimal::from(self.config.shipping_fee)
    }
}

/// All `/api/v1` routes. Admin surfaces live under `/admin` with role-gated
/// middleware; everything else is public or session-gated per module.
pub fn api_v1_routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .nest("/products", handlers::products::admin_routes(state.clone()))
        .nest("/categories", handlers::categories::admin_routes(state.clone()))
        .nest("/brands", handlers::brands::admin_routes(state.clone()))
        .nest("/orders", handlers::orders::admin_routes(state.clone()))
        .nest("/coupons", handlers::coupons::admin_routes(state.clone()))
        .nest("/reviews", handlers::reviews::admin_routes(state.clone()))
        .nest("/banners", handlers::banners::admin_routes(state.clone()))
        .nest(
            "/testimonials",
            handlers::testimonials::admin_routes(state.clone()),
        )
        .nest("/users", handlers::users::admin_routes(state.clone()))
        .nest("/admins", handlers::users::super_admin_routes(state.clone()));

    Router::new()
        .nest("/auth", handlers::auth::routes(state.clone()))
        .nest("/products", handlers::products::routes())
        .nest("/reviews", handlers::reviews::routes(state.clone()))
        .nest("/categories", handlers::categories::routes())
        .nest("/brands", handlers::brands::routes())
        .nest("/banners", handlers::banners::routes())
        .nest("/testimonials", handlers::testimonials::routes())
        .nest("/cart", handlers::carts::routes(state.clone()))
        .nest("/orders", handlers::orders::routes(state.clone()))
        .nest("/coupons", handlers::coupons::routes(state.clone()))
        .nest("/users", handlers::users::routes(state.clone()))
        .nest("/wishlist", handlers::wishlists::routes(state))
        .nest("/admin", admin)
        .route("/openapi.json", get(openapi::openapi_json))
}

/// Builds the complete application router with the middleware stack.
pub fn app(state: AppState) -> Router {
    let cors = build_cors(&state.config);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1_routes(state.clone()))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

fn build_cors(config: &AppConfig) -> CorsLayer {
    match config
        .cors_allowed_origins
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse::<HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true)
        }
        // no configured origins: open CORS without credentials
        None => CorsLayer::permissive(),
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Not Found",
            "message": "The requested resource does not exist",
        })),
    )
}
