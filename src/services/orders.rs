use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::{self, OrderStatus, PaymentStatus};
use crate::entities::{cart_item, order_item, CartItem, Order, OrderItem, User};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::carts::CartService;
use crate::services::coupons::{self, CouponService};
use crate::services::inventory::InventoryService;
use crate::services::notifications::EmailNotifier;
use crate::services::payments::PaymentGatewayClient;

pub const PAYMENT_METHOD_ONLINE: &str = "online";
pub const PAYMENT_METHOD_COD: &str = "cod";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    /// Address book entry to snapshot for shipping
    pub address_id: Uuid,
    #[validate(custom = "validate_payment_method")]
    pub payment_method: String,
    pub coupon_code: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

fn validate_payment_method(method: &str) -> Result<(), validator::ValidationError> {
    match method {
        PAYMENT_METHOD_ONLINE | PAYMENT_METHOD_COD => Ok(()),
        _ => Err(validator::ValidationError::new("unsupported payment method")),
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentInput {
    #[validate(length(min = 1, max = 128))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1, max = 256))]
    pub signature: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CancelOrderInput {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct AdminOrderUpdate {
    pub order_status: Option<OrderStatus>,
    #[validate(length(max = 64))]
    pub tracking_number: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct OrderFilter {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Client-side handle for completing an online payment.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSession {
    pub gateway_order_id: String,
    pub key_id: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub order: OrderView,
    pub payment: Option<PaymentSession>,
}

/// Order lifecycle orchestration. Checkout writes the order and deducts stock
/// in one transaction; settlement and cancellation use conditional updates so
/// each transition happens at most once.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    carts: CartService,
    coupons: CouponService,
    inventory: InventoryService,
    gateway: PaymentGatewayClient,
    notifier: EmailNotifier,
    free_shipping_threshold: Decimal,
    shipping_fee: Decimal,
    currency: String,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        carts: CartService,
        coupons: CouponService,
        inventory: InventoryService,
        gateway: PaymentGatewayClient,
        notifier: EmailNotifier,
        free_shipping_threshold: Decimal,
        shipping_fee: Decimal,
    ) -> Self {
        Self {
            db,
            event_sender,
            carts,
            coupons,
            inventory,
            gateway,
            notifier,
            free_shipping_threshold,
            shipping_fee,
            currency: "INR".to_string(),
        }
    }

    /// Converts the caller's cart into a pending order.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn checkout(
        &self,
        user_id: Uuid,
        input: CheckoutInput,
    ) -> Result<CheckoutView, ServiceError> {
        let user = User::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        let address = user
            .addresses
            .0
            .iter()
            .find(|a| a.id == input.address_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::ValidationError("Shipping address not found".to_string())
            })?;

        let txn = self.db.begin().await?;

        let cart = self.carts.get_or_create(&txn, user_id).await?;
        let lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let subtotal: Decimal = lines.iter().map(cart_item::Model::line_total).sum();
        let shipping_fee = if subtotal >= self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.shipping_fee
        };

        let coupon = match &input.coupon_code {
            Some(code) => Some(
                self.coupons
                    .validate_for_subtotal(&txn, code, subtotal)
                    .await?,
            ),
            None => None,
        };
        let discount = coupon
            .as_ref()
            .map(|c| coupons::discount_for(c, subtotal, shipping_fee))
            .unwrap_or(Decimal::ZERO);
        let total = (subtotal - discount + shipping_fee).max(Decimal::ZERO);

        for line in &lines {
            self.inventory
                .deduct(&txn, line.product_id, line.size.as_deref(), line.quantity)
                .await?;
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number(now)),
            user_id: Set(user_id),
            shipping_address: Set(address),
            payment_method: Set(input.payment_method.clone()),
            payment_status: Set(PaymentStatus::Pending),
            order_status: Set(OrderStatus::Pending),
            gateway_order_id: Set(None),
            gateway_payment_id: Set(None),
            subtotal: Set(subtotal),
            discount: Set(discount),
            shipping_fee: Set(shipping_fee),
            total: Set(total),
            coupon_code: Set(coupon.as_ref().map(|c| c.code.clone())),
            tracking_number: Set(None),
            notes: Set(input.notes),
            estimated_delivery: Set(None),
            cancellation_reason: Set(None),
            cancelled_at: Set(None),
            email_sent: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for line in &lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                size: Set(line.size.clone()),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        if let Some(coupon) = &coupon {
            self.coupons.redeem(&txn, coupon.id, order_id).await?;
        }
        self.carts.clear_in_txn(&txn, cart.id).await?;

        txn.commit().await?;
        info!(order_id = %order_id, order_number = %order.order_number, "order created");
        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;

        let (order, payment) = if input.payment_method == PAYMENT_METHOD_ONLINE {
            self.open_payment_session(order).await?
        } else {
            (self.confirm_cod(order).await?, None)
        };

        let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
        Ok(CheckoutView {
            order: OrderView { order, items },
            payment,
        })
    }

    /// Registers the order with the gateway. A gateway failure voids the
    /// order and puts the stock back so the customer can retry.
    async fn open_payment_session(
        &self,
        order: order::Model,
    ) -> Result<(order::Model, Option<PaymentSession>), ServiceError> {
        let gateway_order = match self
            .gateway
            .create_order(order.total, &self.currency, &order.order_number)
            .await
        {
            Ok(go) => go,
            Err(e) => {
                error!(order_id = %order.id, "gateway order creation failed, voiding order");
                self.void_order(&order, "payment session could not be opened")
                    .await;
                return Err(e);
            }
        };

        let mut active: order::ActiveModel = order.into();
        active.gateway_order_id = Set(Some(gateway_order.id.clone()));
        active.updated_at = Set(Utc::now());
        let order = active.update(self.db.as_ref()).await?;

        let session = PaymentSession {
            gateway_order_id: gateway_order.id,
            key_id: self.gateway.key_id().to_string(),
            amount: order.total,
            currency: self.currency.clone(),
        };
        Ok((order, Some(session)))
    }

    /// Cash-on-delivery orders skip settlement and are confirmed immediately;
    /// payment stays pending until delivery.
    async fn confirm_cod(&self, order: order::Model) -> Result<order::Model, ServiceError> {
        let mut active: order::ActiveModel = order.into();
        active.order_status = Set(OrderStatus::Confirmed);
        active.updated_at = Set(Utc::now());
        let mut order = active.update(self.db.as_ref()).await?;
        if self.send_confirmation(&order).await {
            order.email_sent = true;
        }
        Ok(order)
    }

    /// Settles an online payment from the gateway callback. The pending→paid
    /// transition is a conditional update; a second callback for the same
    /// order is rejected with a conflict.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn verify_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: VerifyPaymentInput,
    ) -> Result<OrderView, ServiceError> {
        let order = self.load_owned(order_id, user_id).await?;

        let gateway_order_id = order.gateway_order_id.clone().ok_or_else(|| {
            ServiceError::InvalidOperation("Order has no payment session".to_string())
        })?;

        if !self.gateway.verify_signature(
            &gateway_order_id,
            &input.gateway_payment_id,
            &input.signature,
        ) {
            // the order stays pending so the customer can retry or cancel
            warn!(order_id = %order.id, "payment signature mismatch");
            return Err(ServiceError::PaymentFailed(
                "Payment could not be verified".to_string(),
            ));
        }

        let result = Order::update_many()
            .set(order::ActiveModel {
                payment_status: Set(PaymentStatus::Paid),
                order_status: Set(OrderStatus::Confirmed),
                gateway_payment_id: Set(Some(input.gateway_payment_id)),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Payment already settled".to_string(),
            ));
        }

        info!(order_id = %order.id, "payment verified");
        self.event_sender.send_or_log(Event::OrderPaid(order.id)).await;

        let mut order = self.load_owned(order_id, user_id).await?;
        if self.send_confirmation(&order).await {
            order.email_sent = true;
        }
        let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
        Ok(OrderView { order, items })
    }

    /// Customer cancellation. Allowed only before payment settles; the
    /// conditional update guarantees the stock restore runs at most once even
    /// when two cancel requests race.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: CancelOrderInput,
    ) -> Result<OrderView, ServiceError> {
        let order = self.load_owned(order_id, user_id).await?;
        self.cancel_internal(order, input.reason).await?;

        let order = self.load_owned(order_id, user_id).await?;
        let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
        Ok(OrderView { order, items })
    }

    async fn cancel_internal(
        &self,
        order: order::Model,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let result = Order::update_many()
            .set(order::ActiveModel {
                payment_status: Set(PaymentStatus::Failed),
                order_status: Set(OrderStatus::Cancelled),
                cancellation_reason: Set(reason),
                cancelled_at: Set(Some(Utc::now())),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .filter(order::Column::OrderStatus.is_in([
                OrderStatus::Pending,
                OrderStatus::Confirmed,
            ]))
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Order can no longer be cancelled".to_string(),
            ));
        }

        self.restore_order_stock(order.id).await;
        info!(order_id = %order.id, "order cancelled");
        self.event_sender
            .send_or_log(Event::OrderCancelled(order.id))
            .await;
        Ok(())
    }

    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let order = self.load_owned(order_id, user_id).await?;
        let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
        Ok(OrderView { order, items })
    }

    pub async fn my_orders(
        &self,
        user_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderView>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        self.with_items(orders).await.map(|views| (views, total))
    }

    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderView>, u64), ServiceError> {
        let mut query = Order::find();
        if let Some(status) = filter.order_status {
            query = query.filter(order::Column::OrderStatus.eq(status));
        }
        if let Some(status) = filter.payment_status {
            query = query.filter(order::Column::PaymentStatus.eq(status));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        self.with_items(orders).await.map(|views| (views, total))
    }

    pub async fn get_order_admin(&self, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
        Ok(OrderView { order, items })
    }

    /// Admin fulfillment updates. The target status is taken as-is (admin
    /// override, no transition validation); cancellation goes through the
    /// same guarded path as customer cancels so stock is restored once.
    #[instrument(skip(self, update), fields(order_id = %order_id))]
    pub async fn admin_update_order(
        &self,
        order_id: Uuid,
        update: AdminOrderUpdate,
    ) -> Result<OrderView, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if update.order_status == Some(OrderStatus::Cancelled) {
            self.cancel_internal(order.clone(), update.notes.clone())
                .await?;
        }

        let old_status = order.order_status;
        let order_number = order.order_number.clone();
        let user_id = order.user_id;

        let mut active: order::ActiveModel = order.into();
        if let Some(next) = update.order_status {
            if next != OrderStatus::Cancelled {
                active.order_status = Set(next);
            }
        }
        if let Some(tracking) = update.tracking_number.clone() {
            active.tracking_number = Set(Some(tracking));
        }
        if let Some(notes) = update.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(eta) = update.estimated_delivery {
            active.estimated_delivery = Set(Some(eta));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(self.db.as_ref()).await?;

        if let Some(next) = update.order_status {
            if next != old_status {
                self.event_sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id,
                        old_status: old_status.to_string(),
                        new_status: next.to_string(),
                    })
                    .await;
            }
            if next == OrderStatus::Shipped {
                if let Some(tracking) = &order.tracking_number {
                    if let Ok(Some(user)) = User::find_by_id(user_id).one(self.db.as_ref()).await {
                        self.notifier
                            .send_shipping_update(&user.email, &order_number, tracking)
                            .await;
                    }
                }
            }
        }

        let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
        Ok(OrderView { order, items })
    }

    /// Loads an order for a specific customer. Unknown ids are a not-found;
    /// an existing order owned by someone else is a forbidden.
    async fn load_owned(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Order belongs to another account".to_string(),
            ));
        }
        Ok(order)
    }

    async fn with_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let items = order.find_related(OrderItem).all(self.db.as_ref()).await?;
            views.push(OrderView { order, items });
        }
        Ok(views)
    }

    /// Marks an unpaid order failed and restores its stock. Used when a
    /// payment session cannot be opened.
    async fn void_order(&self, order: &order::Model, reason: &str) {
        let result = Order::update_many()
            .set(order::ActiveModel {
                payment_status: Set(PaymentStatus::Failed),
                order_status: Set(OrderStatus::Cancelled),
                cancellation_reason: Set(Some(reason.to_string())),
                cancelled_at: Set(Some(Utc::now())),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order.id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Pending))
            .exec(self.db.as_ref())
            .await;
        match result {
            Ok(r) if r.rows_affected > 0 => self.restore_order_stock(order.id).await,
            Ok(_) => {}
            Err(e) => error!(order_id = %order.id, "failed to void order: {}", e),
        }
    }

    /// Best-effort stock restore for every line of an order. Individual
    /// failures are logged and skipped; the cancellation itself stands.
    async fn restore_order_stock(&self, order_id: Uuid) {
        let items = match OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(self.db.as_ref())
            .await
        {
            Ok(items) => items,
            Err(e) => {
                error!(%order_id, "could not load items for stock restore: {}", e);
                return;
            }
        };
        for item in items {
            if let Err(e) = self
                .inventory
                .restore(
                    self.db.as_ref(),
                    item.product_id,
                    item.size.as_deref(),
                    item.quantity,
                )
                .await
            {
                warn!(
                    %order_id,
                    product_id = %item.product_id,
                    "stock restore failed: {}", e
                );
            }
        }
    }

    /// Best-effort confirmation email. Returns whether delivery was recorded
    /// so callers can patch the model they already hold instead of reloading.
    async fn send_confirmation(&self, order: &order::Model) -> bool {
        let Ok(Some(user)) = User::find_by_id(order.user_id).one(self.db.as_ref()).await else {
            return false;
        };
        let sent = self
            .notifier
            .send_order_confirmation(&user.email, order)
            .await;
        if sent {
            let update = Order::update_many()
                .set(order::ActiveModel {
                    email_sent: Set(true),
                    ..Default::default()
                })
                .filter(order::Column::Id.eq(order.id))
                .exec(self.db.as_ref())
                .await;
            if let Err(e) = update {
                warn!(order_id = %order.id, "could not record email delivery: {}", e);
            }
        }
        sent
    }
}

fn generate_order_number(now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_carry_the_date() {
        let now = Utc::now();
        let n = generate_order_number(now);
        assert!(n.starts_with(&format!("ORD-{}-", now.format("%Y%m%d"))));
        assert_eq!(n.len(), "ORD-".len() + 8 + 1 + 6);
    }

    #[test]
    fn payment_methods_validated() {
        assert!(validate_payment_method("online").is_ok());
        assert!(validate_payment_method("cod").is_ok());
        assert!(validate_payment_method("wire").is_err());
    }
}
