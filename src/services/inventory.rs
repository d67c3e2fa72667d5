use std::sync::Arc;

use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::product::{self, StockAdjustError};
use crate::entities::Product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Stock adjustments. Flat-stock products are decremented with a conditional
/// update so two concurrent checkouts cannot both take the last unit; sized
/// products are adjusted read-modify-write inside the caller's transaction,
/// keeping the flat counter equal to the bucket sum.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    #[instrument(skip(self, db))]
    pub async fn deduct<C: ConnectionTrait>(
        &self,
        db: &C,
        product_id: Uuid,
        size: Option<&str>,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let product = Product::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if product.size_stocks.is_empty() {
            if size.is_some() {
                return Err(ServiceError::InvalidOperation(format!(
                    "Product {} has no size variants",
                    product_id
                )));
            }
            let result = Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(quantity),
                )
                .filter(product::Column::Id.eq(product_id))
                .filter(product::Column::Stock.gte(quantity))
                .exec(db)
                .await?;
            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for product {}",
                    product_id
                )));
            }
        } else {
            let size = size.ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Product {} requires a size selection",
                    product_id
                ))
            })?;
            let mut sizes = product.size_stocks.clone();
            sizes.adjust(size, -quantity).map_err(|e| match e {
                StockAdjustError::UnknownSize(s) => ServiceError::InvalidOperation(format!(
                    "Product {} has no size {}",
                    product_id, s
                )),
                StockAdjustError::Insufficient {
                    size,
                    available,
                    requested,
                } => ServiceError::InsufficientStock(format!(
                    "Size {} has {} in stock, {} requested",
                    size, available, requested
                )),
            })?;

            let total = sizes.total();
            let mut active: product::ActiveModel = product.into();
            active.size_stocks = Set(sizes);
            active.stock = Set(total);
            active.update(db).await?;
        }

        self.event_sender
            .send_or_log(Event::StockDeducted {
                product_id,
                size: size.map(str::to_string),
                quantity,
            })
            .await;
        Ok(())
    }

    /// Puts stock back after a cancellation. Unknown products or sizes are
    /// logged and skipped so a restore pass never blocks the cancellation
    /// that triggered it.
    #[instrument(skip(self, db))]
    pub async fn restore<C: ConnectionTrait>(
        &self,
        db: &C,
        product_id: Uuid,
        size: Option<&str>,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if quantity <= 0 {
            return Ok(());
        }

        let Some(product) = Product::find_by_id(product_id).one(db).await? else {
            warn!(%product_id, "restore skipped, product no longer exists");
            return Ok(());
        };

        if product.size_stocks.is_empty() {
            Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).add(quantity),
                )
                .filter(product::Column::Id.eq(product_id))
                .exec(db)
                .await?;
        } else {
            let Some(size) = size else {
                warn!(%product_id, "restore skipped, size missing for sized product");
                return Ok(());
            };
            let mut sizes = product.size_stocks.clone();
            if let Err(StockAdjustError::UnknownSize(s)) = sizes.adjust(size, quantity) {
                warn!(%product_id, size = %s, "restore skipped, size bucket gone");
                return Ok(());
            }
            let total = sizes.total();
            let mut active: product::ActiveModel = product.into();
            active.size_stocks = Set(sizes);
            active.stock = Set(total);
            active.update(db).await?;
        }

        self.event_sender
            .send_or_log(Event::StockRestored {
                product_id,
                size: size.map(str::to_string),
                quantity,
            })
            .await;
        Ok(())
    }
}
