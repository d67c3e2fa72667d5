use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::coupon::{self, CouponKind};
use crate::entities::Coupon;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCouponInput {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    pub description: Option<String>,
    pub kind: CouponKind,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub min_amount: Decimal,
    pub max_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCouponInput {
    pub description: Option<String>,
    pub value: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct CouponService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CouponService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(
        &self,
        input: CreateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let code = input.code.trim().to_uppercase();

        if input.value <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Coupon value must be positive".to_string(),
            ));
        }
        if input.kind == CouponKind::Percentage && input.value > dec!(100) {
            return Err(ServiceError::ValidationError(
                "Percentage discount cannot exceed 100".to_string(),
            ));
        }
        if input.valid_until <= input.valid_from {
            return Err(ServiceError::ValidationError(
                "Coupon validity window is empty".to_string(),
            ));
        }

        let existing = Coupon::find()
            .filter(coupon::Column::Code.eq(code.clone()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Coupon code {} already exists",
                code
            )));
        }

        let now = Utc::now();
        let model = coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            description: Set(input.description),
            kind: Set(input.kind),
            value: Set(input.value),
            max_discount: Set(input.max_discount),
            min_amount: Set(input.min_amount),
            max_amount: Set(input.max_amount),
            usage_limit: Set(input.usage_limit),
            used_count: Set(0),
            valid_from: Set(input.valid_from),
            valid_until: Set(input.valid_until),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(self.db.as_ref()).await?;
        info!(coupon_id = %created.id, "coupon created");
        Ok(created)
    }

    pub async fn list_coupons(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<coupon::Model>, u64), ServiceError> {
        let paginator = Coupon::find()
            .order_by_desc(coupon::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let coupons = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((coupons, total))
    }

    pub async fn get_coupon(&self, id: Uuid) -> Result<coupon::Model, ServiceError> {
        Coupon::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Coupon {} not found", id)))
    }

    #[instrument(skip(self, input))]
    pub async fn update_coupon(
        &self,
        id: Uuid,
        input: UpdateCouponInput,
    ) -> Result<coupon::Model, ServiceError> {
        let existing = self.get_coupon(id).await?;
        let mut active: coupon::ActiveModel = existing.into();

        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(value) = input.value {
            if value <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Coupon value must be positive".to_string(),
                ));
            }
            active.value = Set(value);
        }
        if let Some(max_discount) = input.max_discount {
            active.max_discount = Set(Some(max_discount));
        }
        if let Some(min_amount) = input.min_amount {
            active.min_amount = Set(min_amount);
        }
        if let Some(max_amount) = input.max_amount {
            active.max_amount = Set(Some(max_amount));
        }
        if let Some(usage_limit) = input.usage_limit {
            active.usage_limit = Set(Some(usage_limit));
        }
        if let Some(valid_from) = input.valid_from {
            active.valid_from = Set(valid_from);
        }
        if let Some(valid_until) = input.valid_until {
            active.valid_until = Set(valid_until);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(self.db.as_ref()).await?)
    }

    pub async fn delete_coupon(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Coupon::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Coupon {} not found", id)));
        }
        Ok(())
    }

    /// Looks up a code and runs the eligibility chain against the given
    /// subtotal. Generic over the connection so checkout can validate inside
    /// its own transaction; an unknown code is an invalid coupon, not a 404.
    #[instrument(skip(self, db), fields(code = %code))]
    pub async fn validate_for_subtotal<C: ConnectionTrait>(
        &self,
        db: &C,
        code: &str,
        subtotal: Decimal,
    ) -> Result<coupon::Model, ServiceError> {
        let normalized = code.trim().to_uppercase();
        let found = Coupon::find()
            .filter(coupon::Column::Code.eq(normalized))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::InvalidOperation("Invalid coupon code".to_string()))?;

        check_eligibility(&found, subtotal, Utc::now())?;
        Ok(found)
    }

    /// Pool-backed wrapper for the standalone validate endpoint.
    pub async fn validate_code(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<coupon::Model, ServiceError> {
        self.validate_for_subtotal(self.db.as_ref(), code, subtotal)
            .await
    }

    /// Consumes one use of the coupon inside the caller's transaction. The
    /// usage limit is enforced in the update predicate so two concurrent
    /// checkouts cannot both take the last slot.
    pub async fn redeem<C: ConnectionTrait>(
        &self,
        db: &C,
        coupon_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = Coupon::update_many()
            .col_expr(
                coupon::Column::UsedCount,
                Expr::col(coupon::Column::UsedCount).add(1),
            )
            .col_expr(coupon::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(
                Condition::any()
                    .add(coupon::Column::UsageLimit.is_null())
                    .add(
                        Expr::col(coupon::Column::UsedCount)
                            .lt(Expr::col(coupon::Column::UsageLimit)),
                    ),
            )
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InvalidOperation(
                "Coupon usage limit reached".to_string(),
            ));
        }

        self.event_sender
            .send_or_log(Event::CouponRedeemed {
                coupon_id,
                order_id,
            })
            .await;
        Ok(())
    }
}

/// Eligibility chain: active, inside the validity window, subtotal within
/// bounds, under the usage limit. Checked in that order so the first failure
/// names the actual reason.
pub fn check_eligibility(
    coupon: &coupon::Model,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if !coupon.is_active {
        return Err(ServiceError::InvalidOperation(
            "Coupon is not active".to_string(),
        ));
    }
    if now < coupon.valid_from {
        return Err(ServiceError::InvalidOperation(
            "Coupon is not yet valid".to_string(),
        ));
    }
    if now > coupon.valid_until {
        return Err(ServiceError::InvalidOperation(
            "Coupon has expired".to_string(),
        ));
    }
    if subtotal < coupon.min_amount {
        return Err(ServiceError::InvalidOperation(format!(
            "Order subtotal must be at least {}",
            coupon.min_amount
        )));
    }
    if let Some(max_amount) = coupon.max_amount {
        if subtotal > max_amount {
            return Err(ServiceError::InvalidOperation(format!(
                "Coupon only applies to orders up to {}",
                max_amount
            )));
        }
    }
    if let Some(limit) = coupon.usage_limit {
        if coupon.used_count >= limit {
            return Err(ServiceError::InvalidOperation(
                "Coupon usage limit reached".to_string(),
            ));
        }
    }
    Ok(())
}

/// Discount amount for an eligible coupon. Percentage discounts round to the
/// nearest whole unit (half away from zero) and respect `max_discount`; fixed
/// discounts never exceed the subtotal; shipping coupons waive the fee.
pub fn discount_for(coupon: &coupon::Model, subtotal: Decimal, shipping_fee: Decimal) -> Decimal {
    let discount = match coupon.kind {
        CouponKind::Percentage => {
            let raw = (subtotal * coupon.value / dec!(100))
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            match coupon.max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        CouponKind::Fixed => coupon.value.min(subtotal),
        CouponKind::Shipping => shipping_fee,
    };
    discount.max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(kind: CouponKind, value: Decimal) -> coupon::Model {
        let now = Utc::now();
        coupon::Model {
            id: Uuid::new_v4(),
            code: "SAVE10".to_string(),
            description: None,
            kind,
            value,
            max_discount: None,
            min_amount: Decimal::ZERO,
            max_amount: None,
            usage_limit: None,
            used_count: 0,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percentage_discount_rounds_half_away_from_zero() {
        let c = sample(CouponKind::Percentage, dec!(10));
        // 10% of 105 = 10.5 -> 11
        assert_eq!(discount_for(&c, dec!(105), dec!(50)), dec!(11));
        // 10% of 104 = 10.4 -> 10
        assert_eq!(discount_for(&c, dec!(104), dec!(50)), dec!(10));
    }

    #[test]
    fn percentage_discount_honors_cap() {
        let mut c = sample(CouponKind::Percentage, dec!(50));
        c.max_discount = Some(dec!(100));
        assert_eq!(discount_for(&c, dec!(1000), dec!(0)), dec!(100));
        assert_eq!(discount_for(&c, dec!(100), dec!(0)), dec!(50));
    }

    #[test]
    fn fixed_discount_clamped_to_subtotal() {
        let c = sample(CouponKind::Fixed, dec!(200));
        assert_eq!(discount_for(&c, dec!(150), dec!(0)), dec!(150));
        assert_eq!(discount_for(&c, dec!(500), dec!(0)), dec!(200));
    }

    #[test]
    fn shipping_discount_equals_fee() {
        let c = sample(CouponKind::Shipping, dec!(1));
        assert_eq!(discount_for(&c, dec!(500), dec!(50)), dec!(50));
        assert_eq!(discount_for(&c, dec!(2000), dec!(0)), dec!(0));
    }

    #[test]
    fn eligibility_rejects_inactive() {
        let mut c = sample(CouponKind::Fixed, dec!(10));
        c.is_active = false;
        assert!(check_eligibility(&c, dec!(100), Utc::now()).is_err());
    }

    #[test]
    fn eligibility_window_is_tight_to_the_second() {
        let c = sample(CouponKind::Fixed, dec!(10));

        let too_early = check_eligibility(&c, dec!(100), c.valid_from - Duration::seconds(1));
        assert!(too_early.unwrap_err().to_string().contains("not yet valid"));

        let too_late = check_eligibility(&c, dec!(100), c.valid_until + Duration::seconds(1));
        assert!(too_late.unwrap_err().to_string().contains("expired"));

        assert!(check_eligibility(&c, dec!(100), c.valid_from).is_ok());
        assert!(check_eligibility(&c, dec!(100), c.valid_until).is_ok());
    }

    #[test]
    fn ten_percent_of_1000_capped_at_50() {
        let mut c = sample(CouponKind::Percentage, dec!(10));
        c.max_discount = Some(dec!(50));
        assert_eq!(discount_for(&c, dec!(1000), dec!(0)), dec!(50));
    }

    #[test]
    fn eligibility_enforces_usage_limit() {
        let mut c = sample(CouponKind::Fixed, dec!(10));
        c.usage_limit = Some(5);
        c.used_count = 5;
        assert!(check_eligibility(&c, dec!(100), Utc::now()).is_err());
        c.used_count = 4;
        assert!(check_eligibility(&c, dec!(100), Utc::now()).is_ok());
    }

    #[test]
    fn subtotal_bounds_are_reported_before_the_usage_limit() {
        let mut c = sample(CouponKind::Fixed, dec!(10));
        c.min_amount = dec!(100);
        c.usage_limit = Some(1);
        c.used_count = 1;
        let err = check_eligibility(&c, dec!(50), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("subtotal must be at least"));
    }

    #[test]
    fn eligibility_enforces_subtotal_bounds() {
        let mut c = sample(CouponKind::Fixed, dec!(10));
        c.min_amount = dec!(100);
        c.max_amount = Some(dec!(1000));
        assert!(check_eligibility(&c, dec!(99), Utc::now()).is_err());
        assert!(check_eligibility(&c, dec!(100), Utc::now()).is_ok());
        assert!(check_eligibility(&c, dec!(1001), Utc::now()).is_err());
    }
}
