#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityTrait, Schema, Set,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::config::AppConfig;
use storefront_api::entities::coupon::{self, CouponKind};
use storefront_api::entities::product::{self, Images, ProductStatus, SizeStock, SizeStocks};
use storefront_api::entities::user::{Address, Addresses, Role};
use storefront_api::entities::{admin, user};
use storefront_api::events::{Event, EventSender};
use storefront_api::{AppServices, AppState};

/// Service registry wired to a fresh in-memory database.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub state: AppState,
    // keeps the event channel open so send_or_log stays quiet
    _event_rx: mpsc::Receiver<Event>,
}

impl TestApp {
    pub fn services(&self) -> &AppServices {
        &self.state.services
    }
}

pub async fn setup() -> TestApp {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    // a second pooled connection would see a different in-memory database
    opts.max_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.expect("connect sqlite");

    create_schema(&db).await;

    let db = Arc::new(db);
    let (tx, rx) = mpsc::channel(256);
    let event_sender = Arc::new(EventSender::new(tx));
    let state = AppState::new(Arc::new(test_config()), db.clone(), event_sender);

    TestApp {
        db,
        state,
        _event_rx: rx,
    }
}

async fn create_schema(db: &DatabaseConnection) {
    let backend: DbBackend = db.get_database_backend();
    let schema = Schema::new(backend);

    let statements = vec![
        schema.create_table_from_entity(storefront_api::entities::User),
        schema.create_table_from_entity(storefront_api::entities::Admin),
        schema.create_table_from_entity(storefront_api::entities::Product),
        schema.create_table_from_entity(storefront_api::entities::Category),
        schema.create_table_from_entity(storefront_api::entities::Brand),
        schema.create_table_from_entity(storefront_api::entities::Cart),
        schema.create_table_from_entity(storefront_api::entities::CartItem),
        schema.create_table_from_entity(storefront_api::entities::Order),
        schema.create_table_from_entity(storefront_api::entities::OrderItem),
        schema.create_table_from_entity(storefront_api::entities::Coupon),
        schema.create_table_from_entity(storefront_api::entities::Review),
        schema.create_table_from_entity(storefront_api::entities::Banner),
        schema.create_table_from_entity(storefront_api::entities::Testimonial),
        schema.create_table_from_entity(storefront_api::entities::WishlistItem),
        schema.create_table_from_entity(storefront_api::entities::PasswordResetOtp),
    ];
    for statement in statements {
        db.execute(backend.build(&statement))
            .await
            .expect("create table");
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret-0123456789-0123456789-abc".to_string(),
        jwt_expiration_secs: 3600,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "development".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        cors_allowed_origins: None,
        // unreachable on purpose; online-payment tests exercise the failure path
        gateway_base_url: "http://127.0.0.1:1".to_string(),
        gateway_key_id: "key_test".to_string(),
        gateway_key_secret: "secret_test".to_string(),
        email_relay_url: None,
        email_from: "shop@example.com".to_string(),
        email_timeout_secs: 1,
        free_shipping_threshold: 1000,
        shipping_fee: 50,
        event_channel_capacity: 256,
    }
}

pub fn sample_address() -> Address {
    Address {
        id: Uuid::new_v4(),
        label: "home".to_string(),
        line1: "1 Main St".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        state: "IL".to_string(),
        postal_code: "62701".to_string(),
        country: "US".to_string(),
        phone: None,
        is_default: true,
    }
}

/// Inserts an active customer with one default address.
pub async fn seed_user(app: &TestApp, email: &str) -> user::Model {
    let now = Utc::now();
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Test Customer".to_string()),
        email: Set(email.to_string()),
        password_hash: Set("unused".to_string()),
        role: Set(Role::User),
        addresses: Set(Addresses(vec![sample_address()])),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(app.db.as_ref())
    .await
    .expect("insert user")
}

pub async fn seed_admin(app: &TestApp, email: &str, role: Role) -> admin::Model {
    let now = Utc::now();
    admin::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set("Test Admin".to_string()),
        email: Set(email.to_string()),
        password_hash: Set("unused".to_string()),
        role: Set(role),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(app.db.as_ref())
    .await
    .expect("insert admin")
}

/// Active product without size variants.
pub async fn seed_product(app: &TestApp, slug: &str, price: Decimal, stock: i32) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(slug.replace('-', " ")),
        slug: Set(slug.to_string()),
        description: Set("test product".to_string()),
        price: Set(price),
        compare_at_price: Set(None),
        category_id: Set(None),
        brand_id: Set(None),
        images: Set(Images::default()),
        stock: Set(stock),
        size_stocks: Set(SizeStocks::default()),
        status: Set(ProductStatus::Active),
        rating: Set(Decimal::ZERO),
        review_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(app.db.as_ref())
    .await
    .expect("insert product")
}

/// Active product with M and L size buckets; flat stock equals the sum.
pub async fn seed_sized_product(
    app: &TestApp,
    slug: &str,
    price: Decimal,
    m_stock: i32,
    l_stock: i32,
) -> product::Model {
    let sizes = SizeStocks(vec![
        SizeStock {
            size: "M".to_string(),
            stock: m_stock,
        },
        SizeStock {
            size: "L".to_string(),
            stock: l_stock,
        },
    ]);
    let now = Utc::now();
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(slug.replace('-', " ")),
        slug: Set(slug.to_string()),
        description: Set("test product".to_string()),
        price: Set(price),
        compare_at_price: Set(None),
        category_id: Set(None),
        brand_id: Set(None),
        images: Set(Images::default()),
        stock: Set(m_stock + l_stock),
        size_stocks: Set(sizes),
        status: Set(ProductStatus::Active),
        rating: Set(Decimal::ZERO),
        review_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(app.db.as_ref())
    .await
    .expect("insert product")
}

/// Active fixed-amount coupon valid for a day around now.
pub async fn seed_coupon(
    app: &TestApp,
    code: &str,
    kind: CouponKind,
    value: Decimal,
) -> coupon::Model {
    let now = Utc::now();
    coupon::ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code.to_string()),
        description: Set(None),
        kind: Set(kind),
        value: Set(value),
        max_discount: Set(None),
        min_amount: Set(dec!(0)),
        max_amount: Set(None),
        usage_limit: Set(None),
        used_count: Set(0),
        valid_from: Set(now - Duration::days(1)),
        valid_until: Set(now + Duration::days(1)),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(app.db.as_ref())
    .await
    .expect("insert coupon")
}

pub async fn reload_product(app: &TestApp, id: Uuid) -> product::Model {
    storefront_api::entities::Product::find_by_id(id)
        .one(app.db.as_ref())
        .await
        .expect("query product")
        .expect("product exists")
}
