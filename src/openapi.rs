use axum::Json;
use utoipa::OpenApi;

use crate::entities::coupon::CouponKind;
use crate::entities::order::{OrderStatus, PaymentStatus};
use crate::entities::product::{ProductStatus, SizeStock, SizeStocks};
use crate::entities::user::Role;
use crate::errors::ErrorResponse;
use crate::services::carts::{AddItemInput, UpdateItemInput};
use crate::services::catalog::{
    CreateBrandInput, CreateCategoryInput, CreateProductInput, UpdateProductInput,
};
use crate::services::content::{CreateBannerInput, CreateTestimonialInput, UpdateBannerInput};
use crate::services::coupons::{CreateCouponInput, UpdateCouponInput};
use crate::services::orders::{
    AdminOrderUpdate, CancelOrderInput, CheckoutInput, PaymentSession, VerifyPaymentInput,
};
use crate::services::reviews::SubmitReviewInput;
use crate::services::users::{
    AddressInput, ChangePasswordInput, CreateAdminInput, ForgotPasswordInput, LoginInput,
    RegisterInput, ResetPasswordInput, UpdateProfileInput,
};

/// Schema catalog served at `/api/v1/openapi.json`. Request bodies and shared
/// enums only; response envelopes follow `ApiResponse`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "E-commerce storefront and admin backend",
        license(name = "MIT")
    ),
    components(schemas(
        ErrorResponse,
        Role,
        ProductStatus,
        PaymentStatus,
        OrderStatus,
        CouponKind,
        SizeStock,
        SizeStocks,
        RegisterInput,
        LoginInput,
        ForgotPasswordInput,
        ResetPasswordInput,
        UpdateProfileInput,
        ChangePasswordInput,
        AddressInput,
        CreateAdminInput,
        AddItemInput,
        UpdateItemInput,
        CheckoutInput,
        VerifyPaymentInput,
        CancelOrderInput,
        AdminOrderUpdate,
        PaymentSession,
        CreateProductInput,
        UpdateProductInput,
        CreateCategoryInput,
        CreateBrandInput,
        CreateCouponInput,
        UpdateCouponInput,
        SubmitReviewInput,
        CreateBannerInput,
        UpdateBannerInput,
        CreateTestimonialInput,
    ))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
