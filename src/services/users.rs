use crate::{
    auth::{policy, AuthUser},
    db::DbPool,
    entities::seller_profile::{self, Entity as SellerProfileEntity},
    entities::subscription::{self, Entity as SubscriptionEntity},
    entities::user::{self, Entity as UserEntity, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email(message = "Email must be valid"))]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct BecomeSellerRequest {
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(email(message = "Contact email must be valid"))]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub points: i32,
    #[schema(value_type = Option<Object>)]
    pub seller_profile: Option<seller_profile::Model>,
    #[schema(value_type = Option<Object>)]
    pub subscription: Option<subscription::Model>,
}

impl UserResponse {
    fn from_parts(
        user: user::Model,
        seller_profile: Option<seller_profile::Model>,
        subscription: Option<subscription::Model>,
    ) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            points: user.points,
            seller_profile,
            subscription,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    #[schema(value_type = Vec<Object>)]
    pub users: Vec<user::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Account management over users mirrored from the identity provider
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            sender.send(event).await;
        }
    }

    /// Lists all users (admin only)
    #[instrument(skip(self, caller))]
    pub async fn list_users(
        &self,
        caller: &AuthUser,
        page: u64,
        per_page: u64,
    ) -> Result<UserListResponse, ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators may list users".to_string(),
            ));
        }

        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);
        let paginator = UserEntity::find()
            .order_by_asc(user::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page - 1).await?;

        Ok(UserListResponse {
            users,
            total,
            page,
            per_page,
        })
    }

    /// Fetches a user with their seller profile and subscription attached.
    /// Visible to the user themselves and to admins.
    #[instrument(skip(self, caller))]
    pub async fn get_user(
        &self,
        caller: &AuthUser,
        user_id: &str,
    ) -> Result<UserResponse, ServiceError> {
        if !policy::can_view_user(caller, user_id) {
            return Err(ServiceError::Forbidden(
                "You do not have access to this account".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let seller_profile = SellerProfileEntity::find()
            .filter(seller_profile::Column::UserId.eq(user_id))
            .one(db)
            .await?;
        let subscription = SubscriptionEntity::find()
            .filter(subscription::Column::UserId.eq(user_id))
            .one(db)
            .await?;

        Ok(UserResponse::from_parts(user, seller_profile, subscription))
    }

    /// Internal lookup by id, without visibility checks
    pub async fn find_by_id(&self, user_id: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(UserEntity::find_by_id(user_id).one(&*self.db_pool).await?)
    }

    /// Internal lookup used by login and the identity webhook
    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(UserEntity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db_pool)
            .await?)
    }

    /// Updates profile fields. A user may edit themselves; admins may edit
    /// anyone.
    #[instrument(skip(self, caller, request))]
    pub async fn update_user(
        &self,
        caller: &AuthUser,
        user_id: &str,
        request: UpdateUserRequest,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;

        if !policy::can_view_user(caller, user_id) {
            return Err(ServiceError::Forbidden(
                "You may only edit your own account".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = user.into();
        if let Some(first_name) = request.first_name {
            active.first_name = Set(Some(first_name));
        }
        if let Some(last_name) = request.last_name {
            active.last_name = Set(Some(last_name));
        }
        if let Some(email) = request.email {
            active.email = Set(email);
        }

        Ok(active.update(db).await?)
    }

    /// Deletes a user (admin only)
    #[instrument(skip(self, caller))]
    pub async fn delete_user(&self, caller: &AuthUser, user_id: &str) -> Result<(), ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators may delete users".to_string(),
            ));
        }

        let result = UserEntity::delete_by_id(user_id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "User {} not found",
                user_id
            )));
        }
        Ok(())
    }

    /// Promotes a CLIENT to SELLER and creates their seller profile in one
    /// transaction. Conflict if the user already sells.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn become_seller(
        &self,
        user_id: &str,
        request: BecomeSellerRequest,
    ) -> Result<seller_profile::Model, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;

        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if user.role() == UserRole::Seller {
            return Err(ServiceError::Conflict(
                "User is already a seller".to_string(),
            ));
        }

        let existing_profile = SellerProfileEntity::find()
            .filter(seller_profile::Column::UserId.eq(user_id))
            .one(db)
            .await?;
        if existing_profile.is_some() {
            return Err(ServiceError::Conflict(
                "A seller profile already exists for this user".to_string(),
            ));
        }

        let txn = db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let mut user_active: user::ActiveModel = user.into();
        user_active.role = Set(UserRole::Seller.to_string());
        user_active.update(&txn).await?;

        let profile = seller_profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            company_name: Set(request.company_name),
            description: Set(request.description),
            contact_email: Set(request.contact_email),
            contact_phone: Set(request.contact_phone),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit become-seller transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_id, "user promoted to seller");
        self.emit(Event::UserBecameSeller(user_id.to_string())).await;

        Ok(profile)
    }

    /// Fetches a user's seller profile
    #[instrument(skip(self))]
    pub async fn get_seller_profile(
        &self,
        user_id: &str,
    ) -> Result<seller_profile::Model, ServiceError> {
        SellerProfileEntity::find()
            .filter(seller_profile::Column::UserId.eq(user_id))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No seller profile for user {}", user_id))
            })
    }

    /// Creates an account directly, minting a provider-style id. Used by
    /// the register endpoint for accounts not originating at the identity
    /// provider. Conflict on duplicate email.
    #[instrument(skip(self))]
    pub async fn register(
        &self,
        email: &str,
        first_name: Option<String>,
        last_name: Option<String>,
        role: UserRole,
    ) -> Result<user::Model, ServiceError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let id = format!("user_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
        let created = user::ActiveModel {
            id: Set(id.clone()),
            email: Set(email.to_string()),
            first_name: Set(first_name),
            last_name: Set(last_name),
            role: Set(role.to_string()),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(user_id = %id, "user registered");
        self.emit(Event::UserRegistered(id)).await;
        Ok(created)
    }

    /// Upserts a user row from an identity-provider webhook payload
    pub async fn upsert_from_identity_provider(
        &self,
        id: &str,
        email: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<user::Model, ServiceError> {
        let db = &*self.db_pool;

        match UserEntity::find_by_id(id).one(db).await? {
            Some(existing) => {
                let mut active: user::ActiveModel = existing.into();
                active.email = Set(email.to_string());
                active.first_name = Set(first_name);
                active.last_name = Set(last_name);
                Ok(active.update(db).await?)
            }
            None => {
                let created = user::ActiveModel {
                    id: Set(id.to_string()),
                    email: Set(email.to_string()),
                    first_name: Set(first_name),
                    last_name: Set(last_name),
                    role: Set(UserRole::Client.to_string()),
                    ..Default::default()
                }
                .insert(db)
                .await?;

                self.emit(Event::UserRegistered(id.to_string())).await;
                Ok(created)
            }
        }
    }

    /// Deletes a user in response to an identity-provider deletion event.
    /// Missing rows are ignored so webhook replays stay idempotent.
    pub async fn delete_from_identity_provider(&self, id: &str) -> Result<(), ServiceError> {
        UserEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        Ok(())
    }

    /// Changes a user's role; used when a seller-plan subscription activates
    pub async fn set_role(&self, user_id: &str, role: UserRole) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if user.role() != role {
            let mut active: user::ActiveModel = user.into();
            active.role = Set(role.to_string());
            active.update(db).await?;
        }
        Ok(())
    }

    /// Persists the payment provider's customer reference on the user row
    pub async fn set_stripe_customer_id(
        &self,
        user_id: &str,
        customer_id: &str,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let user = UserEntity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = user.into();
        active.stripe_customer_id = Set(Some(customer_id.to_string()));
        active.update(db).await?;
        Ok(())
    }
}
