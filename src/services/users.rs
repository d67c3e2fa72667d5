use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthService;
use crate::entities::user::{Address, Addresses, Role};
use crate::entities::{admin, password_reset_otp, user, Admin, PasswordResetOtp, User};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::notifications::EmailNotifier;

const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordInput {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 6))]
    pub otp: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 50))]
    pub label: String,
    #[validate(length(min = 1, max = 200))]
    pub line1: String,
    #[validate(length(max = 200))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAdminInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 12, max = 128))]
    pub password: String,
    /// `admin` or `super_admin`
    pub role: Role,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth: AuthService,
    notifier: EmailNotifier,
    event_sender: Arc<EventSender>,
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: AuthService,
        notifier: EmailNotifier,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            auth,
            notifier,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<user::Model, ServiceError> {
        let email = input.email.trim().to_lowercase();
        let existing = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(email),
            password_hash: Set(self.auth.hash_password(&input.password)?),
            role: Set(Role::User),
            addresses: Set(Addresses::default()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(user_id = %created.id, "user registered");
        self.event_sender
            .send_or_log(Event::UserRegistered(created.id))
            .await;
        Ok(created)
    }

    /// Customer login. Every failure path reports the same message so the
    /// response does not leak which emails have accounts.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn authenticate(&self, input: LoginInput) -> Result<user::Model, ServiceError> {
        let email = input.email.trim().to_lowercase();
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?;

        let Some(user) = user else {
            return Err(invalid_credentials());
        };
        if !user.is_active || !self.auth.verify_password(&input.password, &user.password_hash)? {
            return Err(invalid_credentials());
        }

        self.event_sender
            .send_or_log(Event::UserLoggedIn(user.id))
            .await;
        Ok(user)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn authenticate_admin(
        &self,
        input: LoginInput,
    ) -> Result<admin::Model, ServiceError> {
        let email = input.email.trim().to_lowercase();
        let admin = Admin::find()
            .filter(admin::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?;

        let Some(admin) = admin else {
            return Err(invalid_credentials());
        };
        if !admin.is_active
            || !self.auth.verify_password(&input.password, &admin.password_hash)?
        {
            return Err(invalid_credentials());
        }
        Ok(admin)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<user::Model, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut active: user::ActiveModel = user.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, input))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        input: ChangePasswordInput,
    ) -> Result<(), ServiceError> {
        let user = self.get_user(user_id).await?;
        if !self
            .auth
            .verify_password(&input.current_password, &user.password_hash)?
        {
            return Err(ServiceError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(self.auth.hash_password(&input.new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    /// Starts the OTP reset flow. The response is identical whether or not
    /// the email has an account.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn forgot_password(&self, input: ForgotPasswordInput) -> Result<(), ServiceError> {
        let email = input.email.trim().to_lowercase();
        let Some(user) = User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(());
        };

        // one live code per account
        PasswordResetOtp::delete_many()
            .filter(password_reset_otp::Column::UserId.eq(user.id))
            .exec(self.db.as_ref())
            .await?;

        let otp = generate_otp();
        let now = Utc::now();
        password_reset_otp::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            otp_hash: Set(hash_otp(&otp)),
            expires_at: Set(now + Duration::minutes(OTP_TTL_MINUTES)),
            consumed: Set(false),
            created_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        self.notifier
            .send_password_reset_otp(&user.email, &otp, OTP_TTL_MINUTES)
            .await;
        self.event_sender
            .send_or_log(Event::PasswordResetRequested(user.id))
            .await;
        Ok(())
    }

    /// Completes the OTP reset flow. All failure paths collapse into one
    /// message so the code cannot be probed.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn reset_password(&self, input: ResetPasswordInput) -> Result<(), ServiceError> {
        let email = input.email.trim().to_lowercase();
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(invalid_otp)?;

        let record = PasswordResetOtp::find()
            .filter(password_reset_otp::Column::UserId.eq(user.id))
            .filter(password_reset_otp::Column::Consumed.eq(false))
            .order_by_desc(password_reset_otp::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(invalid_otp)?;

        if record.expires_at < Utc::now() || record.otp_hash != hash_otp(&input.otp) {
            warn!(user_id = %user.id, "password reset attempt rejected");
            return Err(invalid_otp());
        }

        let mut otp_active: password_reset_otp::ActiveModel = record.into();
        otp_active.consumed = Set(true);
        otp_active.update(self.db.as_ref()).await?;

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(self.auth.hash_password(&input.new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn add_address(
        &self,
        user_id: Uuid,
        input: AddressInput,
    ) -> Result<user::Model, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut addresses = user.addresses.clone();

        // the first address is always the default
        let make_default = input.is_default || addresses.0.is_empty();
        let address = Address {
            id: Uuid::new_v4(),
            label: input.label,
            line1: input.line1,
            line2: input.line2,
            city: input.city,
            state: input.state,
            postal_code: input.postal_code,
            country: input.country,
            phone: input.phone,
            is_default: false,
        };
        let address_id = address.id;
        addresses.0.push(address);
        if make_default {
            addresses.set_default(address_id);
        }

        self.save_addresses(user, addresses).await
    }

    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        input: AddressInput,
    ) -> Result<user::Model, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut addresses = user.addresses.clone();

        let entry = addresses
            .0
            .iter_mut()
            .find(|a| a.id == address_id)
            .ok_or_else(|| ServiceError::NotFound("Address not found".to_string()))?;
        entry.label = input.label;
        entry.line1 = input.line1;
        entry.line2 = input.line2;
        entry.city = input.city;
        entry.state = input.state;
        entry.postal_code = input.postal_code;
        entry.country = input.country;
        entry.phone = input.phone;
        if input.is_default {
            addresses.set_default(address_id);
        }

        self.save_addresses(user, addresses).await
    }

    pub async fn delete_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut addresses = user.addresses.clone();

        let before = addresses.0.len();
        let was_default = addresses
            .0
            .iter()
            .any(|a| a.id == address_id && a.is_default);
        addresses.0.retain(|a| a.id != address_id);
        if addresses.0.len() == before {
            return Err(ServiceError::NotFound("Address not found".to_string()));
        }
        // keep exactly one default while any address remains
        if was_default {
            if let Some(first_id) = addresses.0.first().map(|a| a.id) {
                addresses.set_default(first_id);
            }
        }

        self.save_addresses(user, addresses).await
    }

    pub async fn set_default_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut addresses = user.addresses.clone();
        if !addresses.set_default(address_id) {
            return Err(ServiceError::NotFound("Address not found".to_string()));
        }
        self.save_addresses(user, addresses).await
    }

    pub async fn list_users(
        &self,
        q: Option<&str>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let mut query = User::find();
        if let Some(q) = q.filter(|q| !q.trim().is_empty()) {
            query = query.filter(
                sea_orm::Condition::any()
                    .add(user::Column::Name.contains(q.trim()))
                    .add(user::Column::Email.contains(q.trim())),
            );
        }
        let paginator = query
            .order_by_desc(user::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((users, total))
    }

    #[instrument(skip(self))]
    pub async fn set_user_active(
        &self,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<user::Model, ServiceError> {
        let user = self.get_user(user_id).await?;
        let mut active: user::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create_admin(
        &self,
        input: CreateAdminInput,
    ) -> Result<admin::Model, ServiceError> {
        if input.role == Role::User {
            return Err(ServiceError::ValidationError(
                "Admin accounts must carry an admin role".to_string(),
            ));
        }
        let email = input.email.trim().to_lowercase();
        let existing = Admin::find()
            .filter(admin::Column::Email.eq(email.clone()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An admin with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(admin::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            email: Set(email),
            password_hash: Set(self.auth.hash_password(&input.password)?),
            role: Set(input.role),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?)
    }

    pub async fn get_admin(&self, id: Uuid) -> Result<admin::Model, ServiceError> {
        Admin::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound("Admin not found".to_string()))
    }

    pub async fn list_admins(&self) -> Result<Vec<admin::Model>, ServiceError> {
        Ok(Admin::find()
            .order_by_asc(admin::Column::Email)
            .all(self.db.as_ref())
            .await?)
    }

    async fn save_addresses(
        &self,
        user: user::Model,
        addresses: Addresses,
    ) -> Result<user::Model, ServiceError> {
        let mut active: user::ActiveModel = user.into();
        active.addresses = Set(addresses);
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.db.as_ref()).await?)
    }
}

fn invalid_credentials() -> ServiceError {
    ServiceError::Unauthorized("Invalid email or password".to_string())
}

fn invalid_otp() -> ServiceError {
    ServiceError::InvalidOperation("Invalid or expired reset code".to_string())
}

fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn hash_otp(otp: &str) -> String {
    hex::encode(Sha256::digest(otp.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn otp_hash_is_stable_and_hex() {
        let a = hash_otp("123456");
        let b = hash_otp("123456");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_otp("654321"));
    }
}
