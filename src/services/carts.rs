use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::product::ProductStatus;
use crate::entities::{cart, cart_item, product, Cart, CartItem, Product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 16))]
    pub size: Option<String>,
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateItemInput {
    #[validate(range(min = 1, max = 99))]
    pub quantity: i32,
}

/// Cart plus its lines, as returned to the storefront. `total` and
/// `item_count` come from the denormalized cart row, which every mutation
/// recomputes from the lines before committing.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub items: Vec<cart_item::Model>,
    pub total: Decimal,
    pub item_count: i32,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create(self.db.as_ref(), user_id).await?;
        let items = cart
            .find_related(CartItem)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(CartView {
            id: cart.id,
            items,
            total: cart.total,
            item_count: cart.item_count,
        })
    }

    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create(&txn, user_id).await?;
        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if product.status != ProductStatus::Active {
            return Err(ServiceError::InvalidOperation(
                "Product is not available for purchase".to_string(),
            ));
        }

        let size = normalize_size(&product, input.size.as_deref())?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .filter(match &size {
                Some(s) => cart_item::Column::Size.eq(s.clone()),
                None => cart_item::Column::Size.is_null(),
            })
            .one(&txn)
            .await?;

        let requested = match &existing {
            Some(line) => line.quantity + input.quantity,
            None => input.quantity,
        };
        if requested > MAX_LINE_QUANTITY {
            return Err(ServiceError::ValidationError(format!(
                "At most {} units of one item per order",
                MAX_LINE_QUANTITY
            )));
        }
        ensure_available(&product, size.as_deref(), requested)?;

        let now = Utc::now();
        let (cart_id, product_id) = (cart.id, product.id);
        match existing {
            Some(line) => {
                let item_id = line.id;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(requested);
                active.updated_at = Set(now);
                active.update(&txn).await?;
                self.event_sender
                    .send_or_log(Event::CartItemUpdated { cart_id, item_id })
                    .await;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart_id),
                    product_id: Set(product_id),
                    product_name: Set(product.name.clone()),
                    size: Set(size),
                    unit_price: Set(product.price),
                    quantity: Set(input.quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                self.event_sender
                    .send_or_log(Event::CartItemAdded {
                        cart_id,
                        product_id,
                    })
                    .await;
            }
        }

        self.recalculate(&txn, cart_id).await?;
        txn.commit().await?;
        self.get_cart(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create(&txn, user_id).await?;
        let line = CartItem::find_by_id(item_id)
            .filter(cart_item::Column::CartId.eq(cart.id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        let product = Product::find_by_id(line.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product no longer exists".to_string()))?;
        ensure_available(&product, line.size.as_deref(), input.quantity)?;

        let cart_id = cart.id;
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(input.quantity);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        self.recalculate(&txn, cart_id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated { cart_id, item_id })
            .await;
        self.get_cart(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create(&txn, user_id).await?;
        let result = CartItem::delete_many()
            .filter(cart_item::Column::Id.eq(item_id))
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Cart item not found".to_string()));
        }

        self.recalculate(&txn, cart.id).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;
        self.get_cart(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.get_or_create(&txn, user_id).await?;
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        self.recalculate(&txn, cart.id).await?;
        txn.commit().await?;

        info!(cart_id = %cart.id, "cart cleared");
        self.event_sender.send_or_log(Event::CartCleared(cart.id)).await;
        self.get_cart(user_id).await
    }

    /// Empties the cart inside the caller's transaction. Used by checkout
    /// after the order rows are written.
    pub async fn clear_in_txn<C: ConnectionTrait>(
        &self,
        db: &C,
        cart_id: Uuid,
    ) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(db)
            .await?;
        self.recalculate(db, cart_id).await?;
        Ok(())
    }

    pub async fn get_or_create<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(db)
            .await?
        {
            return Ok(cart);
        }

        let now = Utc::now();
        let created = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            total: Set(Decimal::ZERO),
            item_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        Ok(created)
    }

    /// Recomputes the denormalized totals from the lines. Runs inside the
    /// same transaction as the mutation that made them stale.
    async fn recalculate<C: ConnectionTrait>(
        &self,
        db: &C,
        cart_id: Uuid,
    ) -> Result<(), ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(db)
            .await?;

        let total: Decimal = items.iter().map(cart_item::Model::line_total).sum();
        let item_count: i32 = items.iter().map(|i| i.quantity).sum();

        let mut active = cart::ActiveModel {
            id: Set(cart_id),
            ..Default::default()
        };
        active.total = Set(total);
        active.item_count = Set(item_count);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;
        Ok(())
    }
}

/// Resolves the effective size for a line: sized products require a size that
/// exists; flat products must not carry one.
fn normalize_size(
    product: &product::Model,
    size: Option<&str>,
) -> Result<Option<String>, ServiceError> {
    if product.size_stocks.is_empty() {
        if size.is_some() {
            return Err(ServiceError::ValidationError(
                "Product has no size variants".to_string(),
            ));
        }
        return Ok(None);
    }
    let size = size.ok_or_else(|| {
        ServiceError::ValidationError("A size selection is required".to_string())
    })?;
    if product.size_stocks.get(size).is_none() {
        return Err(ServiceError::ValidationError(format!(
            "Size {} is not offered",
            size
        )));
    }
    Ok(Some(size.to_string()))
}

/// Checks the requested line quantity against what is on hand. Stock is only
/// reserved at checkout; this keeps obviously unfulfillable carts out.
fn ensure_available(
    product: &product::Model,
    size: Option<&str>,
    quantity: i32,
) -> Result<(), ServiceError> {
    let available = match size {
        Some(s) => product.size_stocks.get(s).map(|b| b.stock).unwrap_or(0),
        None => product.stock,
    };
    if quantity > available {
        return Err(ServiceError::InsufficientStock(format!(
            "Only {} in stock",
            available
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::product::{Images, SizeStock, SizeStocks};
    use rust_decimal_macros::dec;

    fn flat_product(stock: i32) -> product::Model {
        product::Model {
            id: Uuid::new_v4(),
            name: "Tote Bag".into(),
            slug: "tote-bag".into(),
            description: String::new(),
            price: dec!(25),
            compare_at_price: None,
            category_id: None,
            brand_id: None,
            images: Images::default(),
            stock,
            size_stocks: SizeStocks::default(),
            status: ProductStatus::Active,
            rating: Decimal::ZERO,
            review_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sized_product() -> product::Model {
        let mut p = flat_product(8);
        p.size_stocks = SizeStocks(vec![
            SizeStock {
                size: "M".into(),
                stock: 5,
            },
            SizeStock {
                size: "L".into(),
                stock: 3,
            },
        ]);
        p
    }

    #[test]
    fn flat_product_rejects_size() {
        let p = flat_product(10);
        assert!(normalize_size(&p, Some("M")).is_err());
        assert_eq!(normalize_size(&p, None).unwrap(), None);
    }

    #[test]
    fn sized_product_requires_known_size() {
        let p = sized_product();
        assert!(normalize_size(&p, None).is_err());
        assert!(normalize_size(&p, Some("XXL")).is_err());
        assert_eq!(normalize_size(&p, Some("M")).unwrap(), Some("M".into()));
    }

    #[test]
    fn availability_checks_the_right_bucket() {
        let p = sized_product();
        assert!(ensure_available(&p, Some("L"), 3).is_ok());
        assert!(ensure_available(&p, Some("L"), 4).is_err());
        // flat counter is the bucket sum, not a separate pool
        assert!(ensure_available(&p, None, 8).is_ok());
    }
}
