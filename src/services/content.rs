use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{banner, testimonial, Banner, Testimonial};
use crate::errors::ServiceError;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBannerInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(url)]
    pub image_url: String,
    #[validate(url)]
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBannerInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(url)]
    pub link_url: Option<String>,
    pub position: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTestimonialInput {
    #[validate(length(min = 1, max = 100))]
    pub author: String,
    #[validate(length(min = 1, max = 1000))]
    pub quote: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

fn default_true() -> bool {
    true
}

/// Homepage content blocks managed from the admin panel.
#[derive(Clone)]
pub struct ContentService {
    db: Arc<DatabaseConnection>,
}

impl ContentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active banners in display order, for the storefront.
    pub async fn active_banners(&self) -> Result<Vec<banner::Model>, ServiceError> {
        Ok(Banner::find()
            .filter(banner::Column::IsActive.eq(true))
            .order_by_asc(banner::Column::Position)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn list_banners(&self) -> Result<Vec<banner::Model>, ServiceError> {
        Ok(Banner::find()
            .order_by_asc(banner::Column::Position)
            .all(self.db.as_ref())
            .await?)
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_banner(
        &self,
        input: CreateBannerInput,
    ) -> Result<banner::Model, ServiceError> {
        let now = Utc::now();
        Ok(banner::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title),
            image_url: Set(input.image_url),
            link_url: Set(input.link_url),
            position: Set(input.position),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?)
    }

    pub async fn update_banner(
        &self,
        id: Uuid,
        input: UpdateBannerInput,
    ) -> Result<banner::Model, ServiceError> {
        let existing = Banner::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Banner {} not found", id)))?;

        let mut active: banner::ActiveModel = existing.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(image_url);
        }
        if let Some(link_url) = input.link_url {
            active.link_url = Set(Some(link_url));
        }
        if let Some(position) = input.position {
            active.position = Set(position);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db.as_ref()).await?)
    }

    pub async fn delete_banner(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Banner::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Banner {} not found", id)));
        }
        Ok(())
    }

    pub async fn published_testimonials(&self) -> Result<Vec<testimonial::Model>, ServiceError> {
        Ok(Testimonial::find()
            .filter(testimonial::Column::IsPublished.eq(true))
            .order_by_desc(testimonial::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn list_testimonials(&self) -> Result<Vec<testimonial::Model>, ServiceError> {
        Ok(Testimonial::find()
            .order_by_desc(testimonial::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?)
    }

    #[instrument(skip(self, input), fields(author = %input.author))]
    pub async fn create_testimonial(
        &self,
        input: CreateTestimonialInput,
    ) -> Result<testimonial::Model, ServiceError> {
        let now = Utc::now();
        Ok(testimonial::ActiveModel {
            id: Set(Uuid::new_v4()),
            author: Set(input.author),
            quote: Set(input.quote),
            rating: Set(input.rating),
            is_published: Set(input.is_published),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?)
    }

    pub async fn delete_testimonial(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = Testimonial::delete_by_id(id).exec(self.db.as_ref()).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Testimonial {} not found",
                id
            )));
        }
        Ok(())
    }
}
