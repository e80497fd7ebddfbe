use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::subscription::{self, Entity as SubscriptionEntity, SubscriptionStatus, SubscriptionType},
    entities::user::{Entity as UserEntity, UserRole},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    /// Provider-issued subscription id (e.g. `sub_1N...`)
    pub id: String,
    #[serde(rename = "type")]
    pub subscription_type: SubscriptionType,
    pub stripe_price_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    pub status: Option<SubscriptionStatus>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionListResponse {
    #[schema(value_type = Vec<Object>)]
    pub subscriptions: Vec<subscription::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Subscription lifecycle. The payment provider is the source of truth;
/// these rows mirror its state and drive role promotion for seller plans.
#[derive(Clone)]
pub struct SubscriptionService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl SubscriptionService {
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

    /// Creates a subscription for the caller. The plan tier must match the
    /// caller's role: VIP_CLIENT for clients, SELLER_* for sellers. At most
    /// one subscription per user.
    #[instrument(skip(self, caller, request))]
    pub async fn create_subscription(
        &self,
        caller: &AuthUser,
        request: CreateSubscriptionRequest,
    ) -> Result<subscription::Model, ServiceError> {
        let plan_is_seller = request.subscription_type.is_seller_plan();
        let role_matches = match caller.role {
            UserRole::Seller | UserRole::Admin => plan_is_seller,
            UserRole::Client => !plan_is_seller,
        };
        if !role_matches {
            return Err(ServiceError::ValidationError(format!(
                "Subscription type {} does not match role {}",
                request.subscription_type, caller.role
            )));
        }

        let db = &*self.db_pool;

        let existing = SubscriptionEntity::find()
            .filter(subscription::Column::UserId.eq(caller.user_id.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "User already has a subscription".to_string(),
            ));
        }

        let created = subscription::ActiveModel {
            id: Set(request.id),
            user_id: Set(caller.user_id.clone()),
            subscription_type: Set(request.subscription_type.to_string()),
            status: Set(SubscriptionStatus::Active.to_string()),
            stripe_price_id: Set(request.stripe_price_id),
            stripe_customer_id: Set(request.stripe_customer_id),
            start_date: Set(Utc::now()),
            end_date: Set(None),
            current_period_end: Set(request.current_period_end),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(subscription_id = %created.id, user_id = %created.user_id, "subscription created");
        self.emit(Event::SubscriptionActivated {
            subscription_id: created.id.clone(),
            user_id: created.user_id.clone(),
        })
        .await;

        Ok(created)
    }

    /// Lists all subscriptions (admin only)
    #[instrument(skip(self, caller))]
    pub async fn list_subscriptions(
        &self,
        caller: &AuthUser,
        page: u64,
        per_page: u64,
    ) -> Result<SubscriptionListResponse, ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators may list subscriptions".to_string(),
            ));
        }

        let per_page = per_page.clamp(1, 100);
        let page = page.max(1);
        let paginator = SubscriptionEntity::find()
            .order_by_desc(subscription::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);
        let total = paginator.num_items().await?;
        let subscriptions = paginator.fetch_page(page - 1).await?;

        Ok(SubscriptionListResponse {
            subscriptions,
            total,
            page,
            per_page,
        })
    }

    /// Fetches one subscription; visible to its owner and to admins
    #[instrument(skip(self, caller))]
    pub async fn get_subscription(
        &self,
        caller: &AuthUser,
        subscription_id: &str,
    ) -> Result<subscription::Model, ServiceError> {
        let sub = SubscriptionEntity::find_by_id(subscription_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Subscription {} not found", subscription_id))
            })?;

        if !caller.is_admin() && sub.user_id != caller.user_id {
            return Err(ServiceError::Forbidden(
                "You do not have access to this subscription".to_string(),
            ));
        }
        Ok(sub)
    }

    /// The caller's own subscription, if any
    #[instrument(skip(self, caller))]
    pub async fn get_own_subscription(
        &self,
        caller: &AuthUser,
    ) -> Result<subscription::Model, ServiceError> {
        SubscriptionEntity::find()
            .filter(subscription::Column::UserId.eq(caller.user_id.as_str()))
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound("No subscription for this user".to_string()))
    }

    /// Patches subscription fields (admin only)
    #[instrument(skip(self, caller, request))]
    pub async fn update_subscription(
        &self,
        caller: &AuthUser,
        subscription_id: &str,
        request: UpdateSubscriptionRequest,
    ) -> Result<subscription::Model, ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators may update subscriptions".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let sub = SubscriptionEntity::find_by_id(subscription_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Subscription {} not found", subscription_id))
            })?;

        let mut active: subscription::ActiveModel = sub.into();
        if let Some(status) = request.status {
            active.status = Set(status.to_string());
        }
        if let Some(current_period_end) = request.current_period_end {
            active.current_period_end = Set(Some(current_period_end));
        }
        if let Some(end_date) = request.end_date {
            active.end_date = Set(Some(end_date));
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }

        Ok(active.update(db).await?)
    }

    /// Deletes a subscription row (admin only)
    #[instrument(skip(self, caller))]
    pub async fn delete_subscription(
        &self,
        caller: &AuthUser,
        subscription_id: &str,
    ) -> Result<(), ServiceError> {
        if !caller.is_admin() {
            return Err(ServiceError::Forbidden(
                "Only administrators may delete subscriptions".to_string(),
            ));
        }

        let result = SubscriptionEntity::delete_by_id(subscription_id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Subscription {} not found",
                subscription_id
            )));
        }
        Ok(())
    }

    /// Deactivates the caller's own subscription without deleting the row
    #[instrument(skip(self, caller))]
    pub async fn deactivate_own_subscription(
        &self,
        caller: &AuthUser,
    ) -> Result<subscription::Model, ServiceError> {
        let sub = self.get_own_subscription(caller).await?;
        let id = sub.id.clone();

        let mut active: subscription::ActiveModel = sub.into();
        active.status = Set(SubscriptionStatus::Canceled.to_string());
        active.is_active = Set(false);
        active.end_date = Set(Some(Utc::now()));
        let updated = active.update(&*self.db_pool).await?;

        self.emit(Event::SubscriptionCanceled {
            subscription_id: id,
        })
        .await;
        Ok(updated)
    }

    /// Upserts a subscription from a payment-provider event, keyed by the
    /// provider's subscription id. Seller plans promote the user to SELLER.
    pub async fn upsert_from_provider(
        &self,
        id: &str,
        user_id: &str,
        subscription_type: SubscriptionType,
        provider_status: &str,
        stripe_price_id: Option<String>,
        stripe_customer_id: Option<String>,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<subscription::Model, ServiceError> {
        let db = &*self.db_pool;
        let status = SubscriptionStatus::from_provider(provider_status);
        let is_active = matches!(status, SubscriptionStatus::Active | SubscriptionStatus::Trial);

        let saved = match SubscriptionEntity::find_by_id(id).one(db).await? {
            Some(existing) => {
                let mut active: subscription::ActiveModel = existing.into();
                active.status = Set(status.to_string());
                active.is_active = Set(is_active);
                if let Some(price_id) = stripe_price_id {
                    active.stripe_price_id = Set(Some(price_id));
                }
                if let Some(customer_id) = stripe_customer_id {
                    active.stripe_customer_id = Set(Some(customer_id));
                }
                active.current_period_end = Set(current_period_end);
                active.update(db).await?
            }
            None => {
                subscription::ActiveModel {
                    id: Set(id.to_string()),
                    user_id: Set(user_id.to_string()),
                    subscription_type: Set(subscription_type.to_string()),
                    status: Set(status.to_string()),
                    stripe_price_id: Set(stripe_price_id),
                    stripe_customer_id: Set(stripe_customer_id),
                    start_date: Set(Utc::now()),
                    end_date: Set(None),
                    current_period_end: Set(current_period_end),
                    is_active: Set(is_active),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };

        if subscription_type.is_seller_plan() && is_active {
            if let Some(user) = UserEntity::find_by_id(user_id).one(db).await? {
                if user.role() == UserRole::Client {
                    let mut active: crate::entities::user::ActiveModel = user.into();
                    active.role = Set(UserRole::Seller.to_string());
                    active.update(db).await?;
                    self.emit(Event::UserBecameSeller(user_id.to_string())).await;
                }
            }
        }

        self.emit(Event::SubscriptionActivated {
            subscription_id: saved.id.clone(),
            user_id: saved.user_id.clone(),
        })
        .await;

        Ok(saved)
    }

    /// Marks a subscription canceled after a provider deletion event.
    /// Unknown ids are ignored so webhook replays stay idempotent.
    pub async fn cancel_from_provider(&self, id: &str) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        if let Some(sub) = SubscriptionEntity::find_by_id(id).one(db).await? {
            let mut active: subscription::ActiveModel = sub.into();
            active.status = Set(SubscriptionStatus::Canceled.to_string());
            active.is_active = Set(false);
            active.end_date = Set(Some(Utc::now()));
            active.update(db).await?;

            self.emit(Event::SubscriptionCanceled {
                subscription_id: id.to_string(),
            })
            .await;
        }
        Ok(())
    }
}
