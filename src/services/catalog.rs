use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::product::{self, Images, ProductStatus, SizeStocks};
use crate::entities::{brand, category, Brand, Category, Product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Derived from the name when omitted
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub size_stocks: SizeStocks,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_at_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub size_stocks: Option<SizeStocks>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBrandInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub slug: Option<String>,
    pub logo_url: Option<String>,
}

/// Storefront and admin product queries.
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive name search
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub sort: Option<String>,
    /// Admin-only; the public listing always sees Active
    pub status: Option<ProductStatus>,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must be positive".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::ValidationError(
                "Stock cannot be negative".to_string(),
            ));
        }

        let slug = match &input.slug {
            Some(s) => slugify(s),
            None => slugify(&input.name),
        };
        self.ensure_product_slug_free(&slug, None).await?;
        self.check_references(input.category_id, input.brand_id).await?;

        // Sized products keep the flat counter equal to the bucket sum.
        let stock = if input.size_stocks.is_empty() {
            input.stock
        } else {
            input.size_stocks.total()
        };

        let now = Utc::now();
        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description),
            price: Set(input.price),
            compare_at_price: Set(input.compare_at_price),
            category_id: Set(input.category_id),
            brand_id: Set(input.brand_id),
            images: Set(Images(input.images)),
            stock: Set(stock),
            size_stocks: Set(input.size_stocks),
            status: Set(input.status.unwrap_or(ProductStatus::Draft)),
            rating: Set(Decimal::ZERO),
            review_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(product_id = %created.id, "product created");
        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.get_product(id).await?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(slug) = input.slug {
            let slug = slugify(&slug);
            self.ensure_product_slug_free(&slug, Some(id)).await?;
            active.slug = Set(slug);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must be positive".to_string(),
                ));
            }
            active.price = Set(price);
        }
        if let Some(cap) = input.compare_at_price {
            active.compare_at_price = Set(Some(cap));
        }
        if input.category_id.is_some() || input.brand_id.is_some() {
            self.check_references(input.category_id, input.brand_id).await?;
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(brand_id) = input.brand_id {
            active.brand_id = Set(Some(brand_id));
        }
        if let Some(images) = input.images {
            active.images = Set(Images(images));
        }
        if let Some(size_stocks) = input.size_stocks {
            active.stock = Set(size_stocks.total());
            active.size_stocks = Set(size_stocks);
        } else if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock cannot be negative".to_string(),
                ));
            }
            active.stock = Set(stock);
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(self.db.as_ref()).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(updated.id))
            .await;
        Ok(updated)
    }

    /// Archives a product. Rows are kept so order history stays resolvable.
    #[instrument(skip(self))]
    pub async fn archive_product(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get_product(id).await?;
        let mut active: product::ActiveModel = existing.into();
        active.status = Set(ProductStatus::Archived);
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;
        self.event_sender.send_or_log(Event::ProductDeleted(id)).await;
        Ok(())
    }

    pub async fn get_product(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    /// Storefront lookup; only Active products resolve.
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<product::Model, ServiceError> {
        Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::Status.eq(ProductStatus::Active))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", slug)))
    }

    pub async fn list_products(
        &self,
        filter: ProductFilter,
        admin: bool,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = Product::find();

        if admin {
            if let Some(status) = filter.status {
                query = query.filter(product::Column::Status.eq(status));
            }
        } else {
            query = query.filter(product::Column::Status.eq(ProductStatus::Active));
        }
        if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
            query = query.filter(product::Column::Name.contains(q.trim()));
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if let Some(brand_id) = filter.brand_id {
            query = query.filter(product::Column::BrandId.eq(brand_id));
        }

        query = match filter.sort.as_deref() {
            Some("price_asc") => query.order_by_asc(product::Column::Price),
            Some("price_desc") => query.order_by_desc(product::Column::Price),
            Some("rating") => query.order_by_desc(product::Column::Rating),
            Some("name") => query.order_by_asc(product::Column::Name),
            // unknown keys fall back to newest-first
            _ => query.order_by_desc(product::Column::CreatedAt),
        };

        let paginator = query.paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((products, total))
    }

    pub async fn create_category(
        &self,
        input: CreateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let slug = match &input.slug {
            Some(s) => slugify(s),
            None => slugify(&input.name),
        };
        let duplicate = Category::find()
            .filter(category::Column::Slug.eq(slug.clone()))
            .one(self.db.as_ref())
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Category slug {} already exists",
                slug
            )));
        }

        let now = Utc::now();
        Ok(category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(Category::find()
            .order_by_asc(category::Column::Name)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<(), ServiceError> {
        let in_use = Product::find()
            .filter(product::Column::CategoryId.eq(id))
            .count(self.db.as_ref())
            .await?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category is referenced by {} products",
                in_use
            )));
        }
        let result = Category::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }

    pub async fn create_brand(
        &self,
        input: CreateBrandInput,
    ) -> Result<brand::Model, ServiceError> {
        let slug = match &input.slug {
            Some(s) => slugify(s),
            None => slugify(&input.name),
        };
        let duplicate = Brand::find()
            .filter(brand::Column::Slug.eq(slug.clone()))
            .one(self.db.as_ref())
            .await?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Brand slug {} already exists",
                slug
            )));
        }

        let now = Utc::now();
        Ok(brand::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(slug),
            logo_url: Set(input.logo_url),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?)
    }

    pub async fn list_brands(&self) -> Result<Vec<brand::Model>, ServiceError> {
        Ok(Brand::find()
            .order_by_asc(brand::Column::Name)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn delete_brand(&self, id: Uuid) -> Result<(), ServiceError> {
        let in_use = Product::find()
            .filter(product::Column::BrandId.eq(id))
            .count(self.db.as_ref())
            .await?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Brand is referenced by {} products",
                in_use
            )));
        }
        let result = Brand::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Brand {} not found", id)));
        }
        Ok(())
    }

    async fn ensure_product_slug_free(
        &self,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Slug.eq(slug));
        if let Some(id) = exclude {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(self.db.as_ref()).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Product slug {} already exists",
                slug
            )));
        }
        Ok(())
    }

    async fn check_references(
        &self,
        category_id: Option<Uuid>,
        brand_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        if let Some(id) = category_id {
            if Category::find_by_id(id).one(self.db.as_ref()).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Category {} does not exist",
                    id
                )));
            }
        }
        if let Some(id) = brand_id {
            if Brand::find_by_id(id).one(self.db.as_ref()).await?.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "Brand {} does not exist",
                    id
                )));
            }
        }
        Ok(())
    }
}

/// URL-safe slug: lowercase alphanumerics with single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("Linen Shirt"), "linen-shirt");
        assert_eq!(slugify("  Déjà  Vu!  "), "d-j-vu");
        assert_eq!(slugify("Already-Slugged"), "already-slugged");
        assert_eq!(slugify("--weird--input--"), "weird-input");
    }
}
