use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::OrderStatus;
use crate::entities::{order, order_item, product, review, OrderItem, Product, Review};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 150))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
}

/// Product reviews and the denormalized rating aggregates they drive.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Accepts one review per customer per product, and only from customers
    /// who actually ordered it.
    #[instrument(skip(self, input), fields(product_id = %product_id, user_id = %user_id))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        input: SubmitReviewInput,
    ) -> Result<review::Model, ServiceError> {
        let txn = self.db.begin().await?;

        Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let purchased = OrderItem::find()
            .join(JoinType::InnerJoin, order_item::Relation::Order.def())
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::OrderStatus.ne(OrderStatus::Cancelled))
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&txn)
            .await?;
        if purchased == 0 {
            return Err(ServiceError::InvalidOperation(
                "Reviews are limited to purchased products".to_string(),
            ));
        }

        let duplicate = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(
                "You have already reviewed this product".to_string(),
            ));
        }

        let now = Utc::now();
        let created = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(input.rating),
            title: Set(input.title),
            comment: Set(input.comment),
            is_approved: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        self.recompute_aggregates(&txn, product_id).await?;
        txn.commit().await?;

        info!(review_id = %created.id, "review submitted");
        self.event_sender
            .send_or_log(Event::ReviewSubmitted {
                product_id,
                review_id: created.id,
            })
            .await;
        Ok(created)
    }

    /// Approved reviews for the storefront product page.
    pub async fn list_for_product(
        &self,
        product_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<review::Model>, u64), ServiceError> {
        let paginator = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::IsApproved.eq(true))
            .order_by_desc(review::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let reviews = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((reviews, total))
    }

    pub async fn list_all(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<review::Model>, u64), ServiceError> {
        let paginator = Review::find()
            .order_by_desc(review::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let reviews = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((reviews, total))
    }

    #[instrument(skip(self))]
    pub async fn set_approval(
        &self,
        review_id: Uuid,
        approved: bool,
    ) -> Result<review::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let review = Review::find_by_id(review_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;
        let product_id = review.product_id;

        let mut active: review::ActiveModel = review.into();
        active.is_approved = Set(approved);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        self.recompute_aggregates(&txn, product_id).await?;
        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, review_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let review = Review::find_by_id(review_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;
        let product_id = review.product_id;

        review.delete(&txn).await?;
        self.recompute_aggregates(&txn, product_id).await?;
        txn.commit().await?;
        Ok(())
    }

    /// Recomputes `rating` and `review_count` from approved reviews, inside
    /// the same transaction as the change that invalidated them.
    async fn recompute_aggregates<C: ConnectionTrait>(
        &self,
        db: &C,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let approved = Review::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::IsApproved.eq(true))
            .all(db)
            .await?;

        let count = approved.len() as i32;
        let rating = if count == 0 {
            Decimal::ZERO
        } else {
            let sum: Decimal = approved.iter().map(|r| Decimal::from(r.rating)).sum();
            (sum / Decimal::from(count))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        let mut active = product::ActiveModel {
            id: Set(product_id),
            ..Default::default()
        };
        active.rating = Set(rating);
        active.review_count = Set(count);
        active.update(db).await?;
        Ok(())
    }
}
