use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Catalog product. Inventory is either the flat `stock` counter or, when
/// `size_stocks` is non-empty, the per-size breakdown — in which case `stock`
/// must equal the sum of the buckets after every mutation.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    #[sea_orm(column_type = "Json")]
    pub images: Images,
    pub stock: i32,
    #[sea_orm(column_type = "Json")]
    pub size_stocks: SizeStocks,
    pub status: ProductStatus,
    #[sea_orm(column_type = "Decimal(Some((3, 2)))")]
    pub rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::brand::Entity",
        from = "Column::BrandId",
        to = "super::brand::Column::Id"
    )]
    Brand,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::brand::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Brand.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Product status enumeration
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "archived")]
    Archived,
}

/// Image URL list stored as JSON
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Images(pub Vec<String>);

/// Per-size inventory bucket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SizeStock {
    pub size: String,
    pub stock: i32,
}

/// Size-stock breakdown stored as JSON. When non-empty it is the source of
/// truth; the flat `stock` column must equal `total()`.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
    utoipa::ToSchema,
)]
pub struct SizeStocks(pub Vec<SizeStock>);

impl SizeStocks {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> i32 {
        self.0.iter().map(|s| s.stock).sum()
    }

    pub fn get(&self, size: &str) -> Option<&SizeStock> {
        self.0.iter().find(|s| s.size == size)
    }

    /// Applies `delta` to the bucket matching `size`. Fails when the bucket is
    /// missing or the adjustment would push it negative.
    pub fn adjust(&mut self, size: &str, delta: i32) -> Result<(), StockAdjustError> {
        let bucket = self
            .0
            .iter_mut()
            .find(|s| s.size == size)
            .ok_or_else(|| StockAdjustError::UnknownSize(size.to_string()))?;

        let next = bucket.stock + delta;
        if next < 0 {
            return Err(StockAdjustError::Insufficient {
                size: size.to_string(),
                available: bucket.stock,
                requested: -delta,
            });
        }
        bucket.stock = next;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StockAdjustError {
    UnknownSize(String),
    Insufficient {
        size: String,
        available: i32,
        requested: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stocks() -> SizeStocks {
        SizeStocks(vec![
            SizeStock {
                size: "M".into(),
                stock: 5,
            },
            SizeStock {
                size: "L".into(),
                stock: 3,
            },
        ])
    }

    #[test]
    fn adjust_targets_only_the_matching_bucket() {
        let mut s = stocks();
        s.adjust("M", -2).unwrap();
        assert_eq!(s.get("M").unwrap().stock, 3);
        assert_eq!(s.get("L").unwrap().stock, 3);
        assert_eq!(s.total(), 6);
    }

    #[test]
    fn adjust_rejects_overdraw() {
        let mut s = stocks();
        let err = s.adjust("L", -4).unwrap_err();
        assert_eq!(
            err,
            StockAdjustError::Insufficient {
                size: "L".into(),
                available: 3,
                requested: 4,
            }
        );
        // untouched on failure
        assert_eq!(s.get("L").unwrap().stock, 3);
    }

    #[test]
    fn adjust_rejects_unknown_size() {
        let mut s = stocks();
        assert_eq!(
            s.adjust("XXL", -1).unwrap_err(),
            StockAdjustError::UnknownSize("XXL".into())
        );
    }

    #[test]
    fn restore_is_symmetric_with_deduct() {
        let mut s = stocks();
        s.adjust("M", -5).unwrap();
        s.adjust("M", 5).unwrap();
        assert_eq!(s, stocks());
    }
}
